//! State node initialisation for fresh simulation runs.

use std::collections::BTreeSet;

use msc_core::errors::ErrorInfo;
use msc_core::{MscError, RngHandle, StateNodeId, TreeId};
use msc_kernel::ModelState;

/// Prepares a set of state nodes before the first sample is drawn.
///
/// Initialisers declare their targets up front so the driver can refuse
/// configurations where two of them claim the same node.
pub trait StateInitializer {
    /// Human readable label used in logs and diagnostics.
    fn label(&self) -> &str;

    /// State nodes this initialiser writes.
    fn targets(&self) -> Vec<StateNodeId>;

    /// Writes the initial values into the state.
    fn initialize(&mut self, state: &mut ModelState, rng: &mut RngHandle) -> Result<(), MscError>;
}

/// Record of which state nodes have been claimed by an initialiser.
#[derive(Debug, Default)]
pub struct InitializedSet {
    seen: BTreeSet<StateNodeId>,
}

impl InitializedSet {
    /// Creates an empty claim set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a state node, failing when another initialiser already did.
    pub fn claim(&mut self, node: StateNodeId, initializer: &str) -> Result<(), MscError> {
        if !self.seen.insert(node) {
            return Err(MscError::DuplicateInit(
                ErrorInfo::new(
                    "duplicate-initialization",
                    "state node is initialised more than once",
                )
                .with_context("state-node", node.as_raw())
                .with_context("initializer", initializer)
                .with_hint("remove one of the initialisers targeting this node"),
            ));
        }
        Ok(())
    }

    /// Returns the number of claimed nodes.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true when nothing has been claimed yet.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Fills a real parameter with one constant value.
pub struct ConstantParameterInit {
    label: String,
    param: StateNodeId,
    value: f64,
}

impl ConstantParameterInit {
    /// Creates the initialiser for a parameter and value.
    pub fn new(label: impl Into<String>, param: StateNodeId, value: f64) -> Self {
        Self {
            label: label.into(),
            param,
            value,
        }
    }
}

impl StateInitializer for ConstantParameterInit {
    fn label(&self) -> &str {
        &self.label
    }

    fn targets(&self) -> Vec<StateNodeId> {
        vec![self.param]
    }

    fn initialize(&mut self, state: &mut ModelState, _rng: &mut RngHandle) -> Result<(), MscError> {
        state.real_param_mut(self.param)?.fill(self.value)
    }
}

/// Resets a stored tree to the deterministic ladder shape at a fixed root
/// height.
pub struct LadderTreeInit {
    label: String,
    tree: TreeId,
    state_node: StateNodeId,
    root_height: f64,
}

impl LadderTreeInit {
    /// Creates the initialiser for a stored tree and its state node.
    pub fn new(
        label: impl Into<String>,
        tree: TreeId,
        state_node: StateNodeId,
        root_height: f64,
    ) -> Self {
        Self {
            label: label.into(),
            tree,
            state_node,
            root_height,
        }
    }
}

impl StateInitializer for LadderTreeInit {
    fn label(&self) -> &str {
        &self.label
    }

    fn targets(&self) -> Vec<StateNodeId> {
        vec![self.state_node]
    }

    fn initialize(&mut self, state: &mut ModelState, _rng: &mut RngHandle) -> Result<(), MscError> {
        state.trees.get_mut(self.tree)?.reset_to_ladder(self.root_height)
    }
}
