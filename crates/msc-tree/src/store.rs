use std::collections::BTreeMap;

use msc_core::errors::{ErrorInfo, MscError};
use msc_core::{StateNodeId, TreeId};
use serde::{Deserialize, Serialize};

use crate::tree::BinaryTree;

/// Owning arena for the trees a model holds.
///
/// Trees are addressed by [`TreeId`] handles. The store allocates handles
/// monotonically and never reuses one, so a handle kept across a removal
/// stays invalid instead of silently pointing at a different tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeStore {
    trees: BTreeMap<TreeId, BinaryTree>,
    next_raw: u64,
}

impl TreeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tree and returns its freshly allocated handle.
    pub fn insert(&mut self, tree: BinaryTree) -> TreeId {
        let id = TreeId::from_raw(self.next_raw);
        self.next_raw += 1;
        self.trees.insert(id, tree);
        id
    }

    /// Returns a shared reference to the tree behind `id`.
    pub fn get(&self, id: TreeId) -> Result<&BinaryTree, MscError> {
        self.trees.get(&id).ok_or_else(|| unknown_tree(id))
    }

    /// Returns a mutable reference to the tree behind `id`.
    pub fn get_mut(&mut self, id: TreeId) -> Result<&mut BinaryTree, MscError> {
        self.trees.get_mut(&id).ok_or_else(|| unknown_tree(id))
    }

    /// Removes and returns the tree behind `id`.
    pub fn remove(&mut self, id: TreeId) -> Result<BinaryTree, MscError> {
        self.trees.remove(&id).ok_or_else(|| unknown_tree(id))
    }

    /// Returns whether a tree is stored under `id`.
    pub fn contains(&self, id: TreeId) -> bool {
        self.trees.contains_key(&id)
    }

    /// Returns the state node identity of the tree behind `id`.
    pub fn state_node_of(&self, id: TreeId) -> Result<StateNodeId, MscError> {
        Ok(self.get(id)?.id)
    }

    /// Number of stored trees.
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Returns whether the store holds no trees.
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Iterates over the stored handles in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = TreeId> + '_ {
        self.trees.keys().copied()
    }

    /// Iterates over handle and tree pairs in ascending handle order.
    pub fn iter(&self) -> impl Iterator<Item = (TreeId, &BinaryTree)> {
        self.trees.iter().map(|(id, tree)| (*id, tree))
    }
}

fn unknown_tree(id: TreeId) -> MscError {
    MscError::Tree(
        ErrorInfo::new("unknown-tree", "no tree is stored under this handle")
            .with_context("tree-id", id.as_raw()),
    )
}
