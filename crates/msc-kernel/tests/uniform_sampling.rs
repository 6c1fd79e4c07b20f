use std::collections::BTreeMap;

use msc_core::params::IntegerParameter;
use msc_core::rng::RngHandle;
use msc_core::{DistId, KernelPriorId, OperatorId, StateNodeId, TreeId};
use msc_kernel::{
    GeneTreeKernel, GeneTreeLink, KernelPrior, ModelState, OperatorBase, PointerTree, TreeSource,
};
use msc_tree::{BinaryTree, TaxonSet};

fn sample_taxa(n: usize) -> TaxonSet {
    let labels: Vec<String> = (0..n).map(|i| format!("t{}", i + 1)).collect();
    TaxonSet::new(labels).unwrap()
}

fn sample_fixed_state(count: usize) -> (ModelState, Vec<GeneTreeLink>) {
    let species =
        BinaryTree::ladder(StateNodeId::from_raw(1), "species", sample_taxa(3), 5.0).unwrap();
    let mut state = ModelState::new(species);
    let mut links = Vec::new();
    for i in 0..count {
        let tree = BinaryTree::ladder(
            StateNodeId::from_raw(10 + i as u64),
            format!("gene{}", i + 1),
            sample_taxa(4),
            2.0,
        )
        .unwrap();
        let id = state.insert_tree(tree);
        links.push(GeneTreeLink::new(id, DistId::from_raw(100 + i as u64)));
    }
    (state, links)
}

#[test]
fn draws_cover_the_working_set_uniformly() {
    let (mut state, links) = sample_fixed_state(8);
    let source = TreeSource::configure(links.clone(), None, &state).unwrap();
    let base = OperatorBase::new(OperatorId::from_raw(1), "op", source);
    let mut rng = RngHandle::from_seed(20240615);

    let draws = 8000usize;
    let mut counts: BTreeMap<TreeId, usize> = BTreeMap::new();
    for _ in 0..draws {
        let tree = base.sample_tree(&mut state, &mut rng).unwrap();
        *counts.entry(tree).or_insert(0) += 1;
    }

    assert_eq!(counts.len(), 8);
    for link in &links {
        assert!(counts.contains_key(&link.tree));
    }

    let expected = draws as f64 / 8.0;
    let chi_square: f64 = counts
        .values()
        .map(|&observed| {
            let diff = observed as f64 - expected;
            diff * diff / expected
        })
        .sum();
    // 7 degrees of freedom; far above any plausible uniform draw.
    assert!(chi_square < 30.0, "chi-square {chi_square} too large");
}

#[test]
fn kernel_draws_stay_inside_the_current_membership() {
    let species =
        BinaryTree::ladder(StateNodeId::from_raw(1), "species", sample_taxa(3), 5.0).unwrap();
    let mut state = ModelState::new(species);
    let mut member_ids = Vec::new();
    for i in 0..4 {
        let tree = BinaryTree::ladder(
            StateNodeId::from_raw(10 + i as u64),
            format!("kernel-m{}", i + 1),
            sample_taxa(4),
            2.0,
        )
        .unwrap();
        member_ids.push(state.insert_tree(tree));
    }
    let kernel = GeneTreeKernel::new(StateNodeId::from_raw(50), "kernel", member_ids.clone());
    let size = IntegerParameter::new(StateNodeId::from_raw(51), "kernel-size", vec![4], 1, 8);
    let indicator = IntegerParameter::new(StateNodeId::from_raw(52), "indicator", vec![0, 1], 0, 3);
    let pointers = vec![
        PointerTree::new(StateNodeId::from_raw(60), "gene1", 0),
        PointerTree::new(StateNodeId::from_raw(61), "gene2", 1),
    ];
    let prior = KernelPrior::new(
        KernelPriorId::from_raw(1),
        "gtk",
        DistId::from_raw(5),
        kernel,
        size,
        indicator,
        pointers,
    )
    .unwrap();
    let prior_id = prior.id;
    state.insert_prior(prior);

    let source = TreeSource::configure(Vec::new(), Some(prior_id), &state).unwrap();
    let base = OperatorBase::new(OperatorId::from_raw(2), "op", source);
    let mut rng = RngHandle::from_seed(7);

    let mut seen: BTreeMap<TreeId, usize> = BTreeMap::new();
    for _ in 0..400 {
        let tree = base.sample_tree(&mut state, &mut rng).unwrap();
        assert!(member_ids.contains(&tree));
        *seen.entry(tree).or_insert(0) += 1;
    }
    // Every member gets drawn over 400 tries.
    assert_eq!(seen.len(), 4);
}
