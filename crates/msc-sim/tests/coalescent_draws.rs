use std::collections::BTreeSet;

use msc_core::params::RealParameter;
use msc_core::{DistId, RngHandle, StateNodeId, TreeId};
use msc_kernel::ModelState;
use msc_sim::coalescent::{GeneTreeCoalescent, MultispeciesCoalescent, YuleSpeciesTree};
use msc_sim::SampleableDistribution;
use msc_tree::{numeric_newick, BinaryTree, GeneTaxonMap, TaxonSet};

fn sample_taxa(prefix: &str, n: usize) -> TaxonSet {
    let labels: Vec<String> = (0..n).map(|i| format!("{prefix}{}", i + 1)).collect();
    TaxonSet::new(labels).unwrap()
}

/// Four-species ladder with internal heights 1.0, 2.0 and 3.0.
fn fixed_species_tree() -> BinaryTree {
    BinaryTree::ladder(StateNodeId::from_raw(1), "species", sample_taxa("sp", 4), 3.0).unwrap()
}

/// State holding the fixed species tree, a population vector and one gene
/// tree with `lineages` tips per species.
fn sample_gene_state(lineages: usize) -> (ModelState, TreeId, StateNodeId) {
    let species = fixed_species_tree();
    let species_nodes = species.node_count();
    let mut state = ModelState::new(species);
    let pop_id = state.allocate_state_node_id();
    state.insert_real_param(RealParameter::new(
        pop_id,
        "popSize",
        vec![1.0; species_nodes],
    ));
    let node = state.allocate_state_node_id();
    let gene = BinaryTree::ladder(node, "gene1", sample_taxa("g", 4 * lineages), 2.0).unwrap();
    let tree_id = state.insert_tree(gene);
    (state, tree_id, pop_id)
}

fn sample_gene_dist(tree_id: TreeId, pop_id: StateNodeId, lineages: usize) -> GeneTreeCoalescent {
    let map = GeneTaxonMap::regular(4, lineages).unwrap();
    GeneTreeCoalescent::new("gene1.prior", tree_id, DistId::from_raw(2), map, pop_id, 2.0)
        .unwrap()
}

/// Descendant leaf set of every node, children before parents.
fn descendant_leaves(tree: &BinaryTree) -> Vec<BTreeSet<usize>> {
    let mut sets: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); tree.node_count()];
    for leaf in tree.leaves() {
        sets[leaf].insert(leaf);
    }
    for node in tree.internal_nodes() {
        let (left, right) = tree.children(node).unwrap().unwrap();
        let merged: BTreeSet<usize> = sets[left].union(&sets[right]).copied().collect();
        sets[node] = merged;
    }
    sets
}

/// Height of the shallowest species node ancestral to every leaf in `required`.
fn species_mrca_height(species: &BinaryTree, required: &BTreeSet<usize>) -> f64 {
    let sets = descendant_leaves(species);
    let mut best = f64::INFINITY;
    for node in 0..species.node_count() {
        if required.is_subset(&sets[node]) {
            let height = species.height(node).unwrap();
            if height < best {
                best = height;
            }
        }
    }
    best
}

#[test]
fn yule_draws_produce_valid_ultrametric_trees() {
    let species = fixed_species_tree();
    let mut state = ModelState::new(species);
    let birth_id = state.allocate_state_node_id();
    state.insert_real_param(RealParameter::new(birth_id, "birthRate", vec![2.0]));
    let mut dist = YuleSpeciesTree::new("speciesTreePrior", birth_id);
    let mut rng = RngHandle::from_seed(88);
    for _ in 0..10 {
        dist.sample(&mut state, &mut rng).unwrap();
        let tree = &state.species_tree;
        tree.validate().unwrap();
        assert_eq!(tree.root(), tree.node_count() - 1);
        for leaf in tree.leaves() {
            assert_eq!(tree.height(leaf).unwrap(), 0.0);
        }
        assert!(tree.height(tree.root()).unwrap() > 0.0);
    }
}

#[test]
fn gene_draws_respect_species_barriers() {
    let lineages = 2;
    let (mut state, tree_id, pop_id) = sample_gene_state(lineages);
    let map = GeneTaxonMap::regular(4, lineages).unwrap();
    let mut dist = sample_gene_dist(tree_id, pop_id, lineages);
    let mut rng = RngHandle::from_seed(404);
    let species = state.species_tree.clone();
    for _ in 0..20 {
        dist.sample(&mut state, &mut rng).unwrap();
        let gene = state.trees.get(tree_id).unwrap();
        gene.validate().unwrap();
        let sets = descendant_leaves(gene);
        for node in gene.internal_nodes() {
            let species_set: BTreeSet<usize> = sets[node]
                .iter()
                .map(|leaf| map.species_of(*leaf).unwrap())
                .collect();
            let barrier = species_mrca_height(&species, &species_set);
            let height = gene.height(node).unwrap();
            assert!(
                height >= barrier,
                "coalescence at {height} below the species barrier {barrier}"
            );
        }
    }
}

#[test]
fn gene_roots_land_at_the_last_slot() {
    let (mut state, tree_id, pop_id) = sample_gene_state(3);
    let mut dist = sample_gene_dist(tree_id, pop_id, 3);
    let mut rng = RngHandle::from_seed(12);
    dist.sample(&mut state, &mut rng).unwrap();
    let gene = state.trees.get(tree_id).unwrap();
    assert_eq!(gene.root(), gene.node_count() - 1);
    assert_eq!(gene.leaf_count(), 12);
}

#[test]
fn non_positive_populations_are_rejected() {
    let (mut state, tree_id, pop_id) = sample_gene_state(2);
    state.real_param_mut(pop_id).unwrap().fill(0.0).unwrap();
    let mut dist = sample_gene_dist(tree_id, pop_id, 2);
    let mut rng = RngHandle::from_seed(3);
    let err = dist.sample(&mut state, &mut rng).unwrap_err();
    assert_eq!(err.info().code, "non-positive-population");
}

#[test]
fn short_population_vectors_are_rejected() {
    let (mut state, tree_id, _pop_id) = sample_gene_state(2);
    let short_id = state.allocate_state_node_id();
    state.insert_real_param(RealParameter::new(short_id, "popShort", vec![1.0; 3]));
    let mut dist = sample_gene_dist(tree_id, short_id, 2);
    let mut rng = RngHandle::from_seed(3);
    let err = dist.sample(&mut state, &mut rng).unwrap_err();
    assert_eq!(err.info().code, "pop-size-dimension");
}

#[test]
fn zero_birth_rates_are_rejected() {
    let species = fixed_species_tree();
    let mut state = ModelState::new(species);
    let birth_id = state.allocate_state_node_id();
    state.insert_real_param(RealParameter::new(birth_id, "birthRate", vec![0.0]));
    let mut dist = YuleSpeciesTree::new("speciesTreePrior", birth_id);
    let mut rng = RngHandle::from_seed(1);
    let err = dist.sample(&mut state, &mut rng).unwrap_err();
    assert_eq!(err.info().code, "invalid-birth-rate");
}

#[test]
fn taxon_maps_must_match_the_gene_leaves() {
    let (mut state, _tree_id, pop_id) = sample_gene_state(2);
    // Eight mapped leaves against a six-leaf gene tree.
    let map = GeneTaxonMap::regular(4, 2).unwrap();
    let six_node = state.allocate_state_node_id();
    let six = BinaryTree::ladder(six_node, "geneSix", sample_taxa("s", 6), 2.0).unwrap();
    let six_id = state.insert_tree(six);
    let mut dist =
        GeneTreeCoalescent::new("geneSix.prior", six_id, DistId::from_raw(2), map, pop_id, 2.0)
            .unwrap();
    let mut rng = RngHandle::from_seed(9);
    let err = dist.sample(&mut state, &mut rng).unwrap_err();
    assert_eq!(err.info().code, "taxon-map-size");
}

#[test]
fn the_compound_term_draws_nothing_itself() {
    let (mut state, tree_id, _pop_id) = sample_gene_state(2);
    let before_species = numeric_newick(&state.species_tree).unwrap();
    let before_gene = numeric_newick(state.trees.get(tree_id).unwrap()).unwrap();
    let mut dist = MultispeciesCoalescent::new(
        "multispeciesCoalescent",
        vec![DistId::from_raw(2), DistId::from_raw(3)],
    )
    .unwrap();
    let mut rng = RngHandle::from_seed(6);
    dist.sample(&mut state, &mut rng).unwrap();
    assert_eq!(numeric_newick(&state.species_tree).unwrap(), before_species);
    assert_eq!(
        numeric_newick(state.trees.get(tree_id).unwrap()).unwrap(),
        before_gene
    );
}

#[test]
fn invalid_components_are_rejected_up_front() {
    let err = MultispeciesCoalescent::new("empty", Vec::new()).unwrap_err();
    assert_eq!(err.info().code, "empty-compound");

    let (_state, tree_id, pop_id) = sample_gene_state(2);
    let map = GeneTaxonMap::regular(4, 2).unwrap();
    let err =
        GeneTreeCoalescent::new("bad", tree_id, DistId::from_raw(2), map, pop_id, 0.0).unwrap_err();
    assert_eq!(err.info().code, "invalid-ploidy");
}
