//! Ancestral samplers for species trees and per-gene coalescent trees.

use msc_core::errors::ErrorInfo;
use msc_core::{DistId, MscError, RngHandle, StateNodeId, TreeId};
use msc_kernel::ModelState;
use msc_tree::{BinaryTree, GeneTaxonMap};

use crate::graph::SampleableDistribution;

/// Node arrays under construction during a sequence of lineage merges.
///
/// Internal node indices are handed out in merge order starting at the leaf
/// count, so the final merge always produces the root at index `2n - 2`.
struct MergeBuffers {
    parent: Vec<Option<usize>>,
    left: Vec<Option<usize>>,
    right: Vec<Option<usize>>,
    height: Vec<f64>,
    next_internal: usize,
}

impl MergeBuffers {
    fn for_leaves(leaf_count: usize) -> Self {
        let node_count = 2 * leaf_count - 1;
        Self {
            parent: vec![None; node_count],
            left: vec![None; node_count],
            right: vec![None; node_count],
            height: vec![0.0; node_count],
            next_internal: leaf_count,
        }
    }

    fn join(&mut self, first: usize, second: usize, time: f64) -> usize {
        let node = self.next_internal;
        self.next_internal += 1;
        self.left[node] = Some(first);
        self.right[node] = Some(second);
        self.parent[first] = Some(node);
        self.parent[second] = Some(node);
        self.height[node] = time;
        node
    }
}

/// Picks two distinct positions below `bound` by rejection.
fn distinct_pair(rng: &mut RngHandle, bound: usize) -> (usize, usize) {
    let first = rng.next_index(bound);
    let mut second = rng.next_index(bound);
    while second == first {
        second = rng.next_index(bound);
    }
    (first, second)
}

/// Removes two positions from the active lineage list and appends the merged
/// node at the end.
fn replace_pair(active: &mut Vec<usize>, first: usize, second: usize, joined: usize) {
    active.remove(first.max(second));
    active.remove(first.min(second));
    active.push(joined);
}

/// Pure birth prior over the species tree, drawn backwards in time.
///
/// With `k` active lineages the waiting time to the next join is exponential
/// with rate `lambda * k`, and the joined pair is uniform among the active
/// lineages.
pub struct YuleSpeciesTree {
    label: String,
    birth_rate: StateNodeId,
}

impl YuleSpeciesTree {
    /// Creates the prior reading its birth rate from a scalar parameter.
    pub fn new(label: impl Into<String>, birth_rate: StateNodeId) -> Self {
        Self {
            label: label.into(),
            birth_rate,
        }
    }
}

impl SampleableDistribution for YuleSpeciesTree {
    fn label(&self) -> &str {
        &self.label
    }

    fn children(&self) -> Vec<DistId> {
        Vec::new()
    }

    fn sample(&mut self, state: &mut ModelState, rng: &mut RngHandle) -> Result<(), MscError> {
        let lambda = state.real_param(self.birth_rate)?.value(0)?;
        if !lambda.is_finite() || lambda <= 0.0 {
            return Err(MscError::InvalidState(
                ErrorInfo::new("invalid-birth-rate", "birth rate must be positive and finite")
                    .with_context("distribution", &self.label)
                    .with_context("rate", lambda),
            ));
        }
        let leaf_count = state.species_tree.leaf_count();
        let mut buffers = MergeBuffers::for_leaves(leaf_count);
        let mut active: Vec<usize> = (0..leaf_count).collect();
        let mut time = 0.0;
        while active.len() > 1 {
            let k = active.len();
            time += rng.next_exponential(lambda * k as f64);
            let (first, second) = distinct_pair(rng, k);
            let joined = buffers.join(active[first], active[second], time);
            replace_pair(&mut active, first, second, joined);
        }
        let MergeBuffers {
            parent,
            left,
            right,
            height,
            ..
        } = buffers;
        state.species_tree.rebuild(parent, left, right, height)
    }
}

/// One branch-by-branch pass of the multispecies coalescent.
struct GenePass<'a> {
    species: &'a BinaryTree,
    leaves_by_species: Vec<Vec<usize>>,
    branch_sizes: Vec<f64>,
    ploidy: f64,
    buffers: MergeBuffers,
}

impl GenePass<'_> {
    /// Coalesces the lineages entering a species branch and returns the
    /// survivors leaving through its top.
    ///
    /// Children are processed first, then the gene leaves mapped to this
    /// species node join the active list. Above the species root the branch
    /// is unbounded, so the walk always ends with a single lineage.
    fn descend(&mut self, species_node: usize, rng: &mut RngHandle) -> Result<Vec<usize>, MscError> {
        let mut lineage = Vec::new();
        if let Some((left_child, right_child)) = self.species.children(species_node)? {
            lineage.extend(self.descend(left_child, rng)?);
            lineage.extend(self.descend(right_child, rng)?);
        }
        if species_node < self.leaves_by_species.len() {
            lineage.extend(self.leaves_by_species[species_node].iter().copied());
        }

        let branch_size = self.branch_sizes[species_node] * self.ploidy;
        let mut time = self.species.height(species_node)?;
        let branch_end = match self.species.parent(species_node)? {
            Some(parent) => self.species.height(parent)?,
            None => f64::INFINITY,
        };
        while lineage.len() > 1 {
            let k = lineage.len();
            let rate = (k * (k - 1)) as f64 / 2.0 / branch_size;
            time += rng.next_exponential(rate);
            if time > branch_end {
                break;
            }
            let (first, second) = distinct_pair(rng, k);
            let joined = self.buffers.join(lineage[first], lineage[second], time);
            replace_pair(&mut lineage, first, second, joined);
        }
        Ok(lineage)
    }
}

/// Coalescent distribution of one gene tree embedded in the species tree.
#[derive(Debug)]
pub struct GeneTreeCoalescent {
    label: String,
    target: TreeId,
    species_term: DistId,
    map: GeneTaxonMap,
    pop_sizes: StateNodeId,
    ploidy: f64,
}

impl GeneTreeCoalescent {
    /// Creates the distribution writing into the gene tree `target`.
    ///
    /// `pop_sizes` must cover every species tree node, one effective
    /// population size per branch.
    pub fn new(
        label: impl Into<String>,
        target: TreeId,
        species_term: DistId,
        map: GeneTaxonMap,
        pop_sizes: StateNodeId,
        ploidy: f64,
    ) -> Result<Self, MscError> {
        let label = label.into();
        if !ploidy.is_finite() || ploidy <= 0.0 {
            return Err(MscError::Config(
                ErrorInfo::new("invalid-ploidy", "ploidy must be positive and finite")
                    .with_context("distribution", &label)
                    .with_context("ploidy", ploidy),
            ));
        }
        Ok(Self {
            label,
            target,
            species_term,
            map,
            pop_sizes,
            ploidy,
        })
    }

    /// Returns the gene tree this distribution draws.
    pub fn target(&self) -> TreeId {
        self.target
    }
}

impl SampleableDistribution for GeneTreeCoalescent {
    fn label(&self) -> &str {
        &self.label
    }

    fn children(&self) -> Vec<DistId> {
        vec![self.species_term]
    }

    fn sample(&mut self, state: &mut ModelState, rng: &mut RngHandle) -> Result<(), MscError> {
        let species_nodes = state.species_tree.node_count();
        let pop = state.real_param(self.pop_sizes)?;
        if pop.dimension() < species_nodes {
            return Err(MscError::Config(
                ErrorInfo::new("pop-size-dimension", "population sizes must cover every species branch")
                    .with_context("parameter", &pop.label)
                    .with_context("dimension", pop.dimension())
                    .with_context("species-nodes", species_nodes),
            ));
        }
        let branch_sizes: Vec<f64> = pop.values()[..species_nodes].to_vec();
        for (species_node, &size) in branch_sizes.iter().enumerate() {
            if !size.is_finite() || size <= 0.0 {
                return Err(MscError::InvalidState(
                    ErrorInfo::new("non-positive-population", "population size must be positive")
                        .with_context("parameter", &pop.label)
                        .with_context("species-node", species_node)
                        .with_context("value", size),
                ));
            }
        }

        let gene_leaves = state.trees.get(self.target)?.leaf_count();
        if self.map.gene_leaf_count() != gene_leaves {
            return Err(MscError::Config(
                ErrorInfo::new("taxon-map-size", "taxon map does not cover the gene tree leaves")
                    .with_context("distribution", &self.label)
                    .with_context("map-leaves", self.map.gene_leaf_count())
                    .with_context("tree-leaves", gene_leaves),
            ));
        }
        let species = &state.species_tree;
        let mut leaves_by_species = vec![Vec::new(); species.leaf_count()];
        for gene_leaf in 0..gene_leaves {
            let species_leaf = self.map.species_of(gene_leaf)?;
            leaves_by_species[species_leaf].push(gene_leaf);
        }

        let mut pass = GenePass {
            species,
            leaves_by_species,
            branch_sizes,
            ploidy: self.ploidy,
            buffers: MergeBuffers::for_leaves(gene_leaves),
        };
        let survivors = pass.descend(species.root(), rng)?;
        debug_assert_eq!(survivors.len(), 1);
        let MergeBuffers {
            parent,
            left,
            right,
            height,
            ..
        } = pass.buffers;
        state.trees.get_mut(self.target)?.rebuild(parent, left, right, height)
    }
}

/// Compound joining the species prior and every gene tree term.
///
/// Draws nothing itself. Sampling it realises the species tree first and
/// then each gene tree, in declaration order.
#[derive(Debug)]
pub struct MultispeciesCoalescent {
    label: String,
    components: Vec<DistId>,
}

impl MultispeciesCoalescent {
    /// Creates the compound over its component terms.
    pub fn new(label: impl Into<String>, components: Vec<DistId>) -> Result<Self, MscError> {
        let label = label.into();
        if components.is_empty() {
            return Err(MscError::Config(
                ErrorInfo::new("empty-compound", "a compound distribution needs components")
                    .with_context("distribution", &label),
            ));
        }
        Ok(Self { label, components })
    }
}

impl SampleableDistribution for MultispeciesCoalescent {
    fn label(&self) -> &str {
        &self.label
    }

    fn children(&self) -> Vec<DistId> {
        self.components.clone()
    }

    fn sample(&mut self, _state: &mut ModelState, _rng: &mut RngHandle) -> Result<(), MscError> {
        Ok(())
    }
}
