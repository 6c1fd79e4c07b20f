use std::collections::BTreeMap;

use msc_core::errors::{ErrorInfo, MscError};
use msc_core::params::RealParameter;
use msc_core::{KernelPriorId, StateNodeId, TreeId};
use msc_tree::{BinaryTree, TreeStore};

use crate::prior::KernelPrior;

/// The complete mutable state of a run.
///
/// Proposals, samplers and initializers all work through one `&mut` borrow of
/// this struct. Fields are public so callers can split the borrow across the
/// tree store and the prior arena within a single proposal.
#[derive(Debug, Clone)]
pub struct ModelState {
    /// Every tree in the run, gene trees and kernel members alike.
    pub trees: TreeStore,
    /// The species tree that constrains gene tree simulation.
    pub species_tree: BinaryTree,
    /// Real valued parameter state nodes keyed by identity.
    pub real_params: BTreeMap<StateNodeId, RealParameter>,
    /// Kernel priors keyed by identity.
    pub priors: BTreeMap<KernelPriorId, KernelPrior>,
    next_state_node_raw: u64,
}

impl ModelState {
    /// Creates a state holding the given species tree and nothing else.
    pub fn new(species_tree: BinaryTree) -> Self {
        let mut state = Self {
            trees: TreeStore::new(),
            species_tree,
            real_params: BTreeMap::new(),
            priors: BTreeMap::new(),
            next_state_node_raw: 0,
        };
        state.note_state_node(state.species_tree.id);
        state
    }

    /// Allocates a state node identity no configured node uses.
    pub fn allocate_state_node_id(&mut self) -> StateNodeId {
        let id = StateNodeId::from_raw(self.next_state_node_raw);
        self.next_state_node_raw += 1;
        id
    }

    /// Adds a tree to the store, registering its state node identity.
    pub fn insert_tree(&mut self, tree: BinaryTree) -> TreeId {
        self.note_state_node(tree.id);
        self.trees.insert(tree)
    }

    /// Adds a real parameter, keyed by its own identity.
    pub fn insert_real_param(&mut self, param: RealParameter) {
        self.note_state_node(param.id);
        self.real_params.insert(param.id, param);
    }

    /// Adds a kernel prior, registering every state node it owns.
    pub fn insert_prior(&mut self, prior: KernelPrior) {
        self.note_state_node(prior.kernel().id);
        self.note_state_node(prior.size().id);
        self.note_state_node(prior.indicator().id);
        for pointer in prior.pointers() {
            self.note_state_node(pointer.id);
        }
        self.priors.insert(prior.id, prior);
    }

    /// Returns the real parameter behind `id`.
    pub fn real_param(&self, id: StateNodeId) -> Result<&RealParameter, MscError> {
        self.real_params.get(&id).ok_or_else(|| unknown_param(id))
    }

    /// Returns the real parameter behind `id` for mutation.
    pub fn real_param_mut(&mut self, id: StateNodeId) -> Result<&mut RealParameter, MscError> {
        self.real_params
            .get_mut(&id)
            .ok_or_else(|| unknown_param(id))
    }

    /// Returns the kernel prior behind `id`.
    pub fn prior(&self, id: KernelPriorId) -> Result<&KernelPrior, MscError> {
        self.priors.get(&id).ok_or_else(|| unknown_prior(id))
    }

    /// Returns the kernel prior behind `id` for mutation.
    pub fn prior_mut(&mut self, id: KernelPriorId) -> Result<&mut KernelPrior, MscError> {
        self.priors.get_mut(&id).ok_or_else(|| unknown_prior(id))
    }

    /// Returns the prior for mutation together with the tree store.
    ///
    /// Link materialisation registers an editor on the prior while it
    /// dereferences member trees, which needs both borrows at once.
    pub fn prior_with_trees_mut(
        &mut self,
        id: KernelPriorId,
    ) -> Result<(&mut KernelPrior, &TreeStore), MscError> {
        let Self { trees, priors, .. } = self;
        let prior = priors.get_mut(&id).ok_or_else(|| unknown_prior(id))?;
        Ok((prior, trees))
    }

    fn note_state_node(&mut self, id: StateNodeId) {
        self.next_state_node_raw = self.next_state_node_raw.max(id.as_raw() + 1);
    }
}

fn unknown_param(id: StateNodeId) -> MscError {
    MscError::Config(
        ErrorInfo::new("unknown-parameter", "no parameter is registered under this identity")
            .with_context("state-node", id.as_raw()),
    )
}

fn unknown_prior(id: KernelPriorId) -> MscError {
    MscError::Config(
        ErrorInfo::new("unknown-kernel-prior", "no kernel prior is registered under this identity")
            .with_context("prior-id", id.as_raw()),
    )
}
