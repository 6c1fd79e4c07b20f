use msc_core::errors::{ErrorInfo, MscError};
use msc_core::{OperatorId, StateNodeId, TreeId};
use serde::{Deserialize, Serialize};

/// State node owning the ordered, mutable list of kernel member trees.
///
/// The kernel records which operator most recently began editing it so the
/// host's restore machinery can attribute a pending change. Membership is
/// positional: pointer trees address members by index through the shared
/// indicator parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneTreeKernel {
    /// State node identity of the kernel itself.
    pub id: StateNodeId,
    /// Human readable label used in logs and diagnostics.
    pub label: String,
    trees: Vec<TreeId>,
    editing: Option<OperatorId>,
}

impl GeneTreeKernel {
    /// Creates a kernel over an initial member list.
    pub fn new(id: StateNodeId, label: impl Into<String>, trees: Vec<TreeId>) -> Self {
        Self {
            id,
            label: label.into(),
            trees,
            editing: None,
        }
    }

    /// Returns the current number of member trees.
    pub fn size(&self) -> usize {
        self.trees.len()
    }

    /// Returns whether the kernel has no members.
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Returns the member handles in kernel order.
    pub fn tree_ids(&self) -> &[TreeId] {
        &self.trees
    }

    /// Returns the member at the given kernel index.
    pub fn tree_at(&self, index: usize) -> Result<TreeId, MscError> {
        self.trees
            .get(index)
            .copied()
            .ok_or_else(|| self.index_error(index))
    }

    /// Appends a member tree.
    pub fn add_tree(&mut self, tree: TreeId) {
        self.trees.push(tree);
    }

    /// Removes and returns the member at the given kernel index.
    ///
    /// Members above the index shift down by one, which is why indicator
    /// entries are renumbered by the resize move before the removal lands.
    pub fn remove_tree(&mut self, index: usize) -> Result<TreeId, MscError> {
        if index >= self.trees.len() {
            return Err(self.index_error(index));
        }
        Ok(self.trees.remove(index))
    }

    /// Marks the kernel as being edited by the given operator.
    pub fn begin_edit(&mut self, operator: OperatorId) {
        self.editing = Some(operator);
    }

    /// Returns the operator that most recently began editing the kernel.
    pub fn last_editor(&self) -> Option<OperatorId> {
        self.editing
    }

    fn index_error(&self, index: usize) -> MscError {
        MscError::Kernel(
            ErrorInfo::new("kernel-index", "kernel member index out of range")
                .with_context("kernel", &self.label)
                .with_context("index", index)
                .with_context("size", self.trees.len()),
        )
    }
}
