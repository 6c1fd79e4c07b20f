use std::ops::Range;

use msc_core::errors::{ErrorInfo, MscError};
use msc_core::StateNodeId;
use serde::{Deserialize, Serialize};

use crate::taxa::TaxonSet;

/// Rooted binary tree over flat node arrays.
///
/// A tree over `n` taxa always holds `2n - 1` nodes: leaves occupy indices
/// `0..n` in taxon order, internal nodes occupy `n..2n-1`, and the root is the
/// last node. Structure is encoded in `parent`/`left`/`right` index arrays and
/// node ages in `height`, with leaves at height zero unless set otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryTree {
    /// State node identity of the tree.
    pub id: StateNodeId,
    /// Human readable label used in logs and diagnostics.
    pub label: String,
    taxa: TaxonSet,
    parent: Vec<Option<usize>>,
    left: Vec<Option<usize>>,
    right: Vec<Option<usize>>,
    height: Vec<f64>,
}

impl BinaryTree {
    /// Builds a deterministic ladder tree with the root at `root_height`.
    ///
    /// Internal node `n + k` joins leaf `k + 1` with the previous internal
    /// node (or leaf 0 for `k = 0`), with heights evenly spaced up to the
    /// root. Used for start states and as a known shape in tests.
    pub fn ladder(
        id: StateNodeId,
        label: impl Into<String>,
        taxa: TaxonSet,
        root_height: f64,
    ) -> Result<Self, MscError> {
        let label = label.into();
        if !root_height.is_finite() || root_height <= 0.0 {
            return Err(MscError::Tree(
                ErrorInfo::new("invalid-root-height", "root height must be positive and finite")
                    .with_context("tree", &label)
                    .with_context("height", root_height),
            ));
        }
        let n = taxa.len();
        let node_count = 2 * n - 1;
        let mut parent = vec![None; node_count];
        let mut left = vec![None; node_count];
        let mut right = vec![None; node_count];
        let mut height = vec![0.0; node_count];

        for k in 0..n - 1 {
            let internal = n + k;
            let lower_child = if k == 0 { 0 } else { n + k - 1 };
            let upper_child = k + 1;
            left[internal] = Some(lower_child);
            right[internal] = Some(upper_child);
            parent[lower_child] = Some(internal);
            parent[upper_child] = Some(internal);
            height[internal] = root_height * (k + 1) as f64 / (n - 1) as f64;
        }

        Ok(Self {
            id,
            label,
            taxa,
            parent,
            left,
            right,
            height,
        })
    }

    /// Builds a tree directly from node arrays, validating the structure.
    pub fn from_parts(
        id: StateNodeId,
        label: impl Into<String>,
        taxa: TaxonSet,
        parent: Vec<Option<usize>>,
        left: Vec<Option<usize>>,
        right: Vec<Option<usize>>,
        height: Vec<f64>,
    ) -> Result<Self, MscError> {
        let tree = Self {
            id,
            label: label.into(),
            taxa,
            parent,
            left,
            right,
            height,
        };
        tree.validate()?;
        Ok(tree)
    }

    /// Returns the taxon set labelling the leaves.
    pub fn taxa(&self) -> &TaxonSet {
        &self.taxa
    }

    /// Returns the number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.taxa.len()
    }

    /// Returns the total number of nodes (`2n - 1`).
    pub fn node_count(&self) -> usize {
        self.parent.len()
    }

    /// Returns the number of internal nodes (`n - 1`).
    pub fn internal_node_count(&self) -> usize {
        self.leaf_count() - 1
    }

    /// Returns the root node index (always the last node).
    pub fn root(&self) -> usize {
        self.node_count() - 1
    }

    /// Returns whether the given node is a leaf.
    pub fn is_leaf(&self, node: usize) -> bool {
        node < self.leaf_count()
    }

    /// Iterates over the leaf node indices.
    pub fn leaves(&self) -> Range<usize> {
        0..self.leaf_count()
    }

    /// Iterates over the internal node indices, root included.
    pub fn internal_nodes(&self) -> Range<usize> {
        self.leaf_count()..self.node_count()
    }

    /// Returns the parent of a node, or `None` for the root.
    pub fn parent(&self, node: usize) -> Result<Option<usize>, MscError> {
        self.parent
            .get(node)
            .copied()
            .ok_or_else(|| self.unknown_node(node))
    }

    /// Returns the two children of an internal node, or `None` for a leaf.
    pub fn children(&self, node: usize) -> Result<Option<(usize, usize)>, MscError> {
        if node >= self.node_count() {
            return Err(self.unknown_node(node));
        }
        match (self.left[node], self.right[node]) {
            (Some(l), Some(r)) => Ok(Some((l, r))),
            _ => Ok(None),
        }
    }

    /// Returns the height of a node.
    pub fn height(&self, node: usize) -> Result<f64, MscError> {
        self.height
            .get(node)
            .copied()
            .ok_or_else(|| self.unknown_node(node))
    }

    /// Sets the height of a node. Order against neighbours is not checked.
    pub fn set_height(&mut self, node: usize, height: f64) -> Result<(), MscError> {
        if !height.is_finite() {
            return Err(MscError::Tree(
                ErrorInfo::new("non-finite-height", "node heights must be finite")
                    .with_context("tree", &self.label)
                    .with_context("node", node),
            ));
        }
        let count = self.node_count();
        let slot = self
            .height
            .get_mut(node)
            .ok_or_else(|| unknown_node_error(&self.label, node, count))?;
        *slot = height;
        Ok(())
    }

    /// Returns the larger of the two child heights of an internal node.
    pub fn max_child_height(&self, node: usize) -> Result<f64, MscError> {
        let (l, r) = self.children(node)?.ok_or_else(|| {
            MscError::Tree(
                ErrorInfo::new("leaf-has-no-children", "height bound requested for a leaf")
                    .with_context("tree", &self.label)
                    .with_context("node", node),
            )
        })?;
        Ok(self.height[l].max(self.height[r]))
    }

    /// Multiplies every internal node height by `factor`.
    ///
    /// Returns the number of scaled nodes. Fails without mutating when the
    /// factor is not a positive finite number or when scaling would place a
    /// parent below one of its children.
    pub fn scale(&mut self, factor: f64) -> Result<usize, MscError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(MscError::Tree(
                ErrorInfo::new("invalid-scale-factor", "scale factor must be positive and finite")
                    .with_context("tree", &self.label)
                    .with_context("factor", factor),
            ));
        }
        for node in self.internal_nodes() {
            let scaled = self.height[node] * factor;
            let (l, r) = match (self.left[node], self.right[node]) {
                (Some(l), Some(r)) => (l, r),
                _ => continue,
            };
            let bound = |child: usize| {
                if self.is_leaf(child) {
                    self.height[child]
                } else {
                    self.height[child] * factor
                }
            };
            if scaled < bound(l) || scaled < bound(r) {
                return Err(MscError::Tree(
                    ErrorInfo::new("scale-inverts-order", "scaling would place a parent below a child")
                        .with_context("tree", &self.label)
                        .with_context("node", node)
                        .with_context("factor", factor),
                ));
            }
        }
        for node in self.internal_nodes() {
            self.height[node] *= factor;
        }
        Ok(self.internal_node_count())
    }

    /// Replaces the whole structure with the provided arrays after validation.
    pub fn rebuild(
        &mut self,
        parent: Vec<Option<usize>>,
        left: Vec<Option<usize>>,
        right: Vec<Option<usize>>,
        height: Vec<f64>,
    ) -> Result<(), MscError> {
        let candidate = Self {
            id: self.id,
            label: self.label.clone(),
            taxa: self.taxa.clone(),
            parent,
            left,
            right,
            height,
        };
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// Copies the structure of another tree over the same taxa.
    pub fn assign_from(&mut self, other: &Self) -> Result<(), MscError> {
        if self.taxa != other.taxa {
            return Err(MscError::Tree(
                ErrorInfo::new("taxa-mismatch", "trees are built over different taxa")
                    .with_context("target", &self.label)
                    .with_context("source", &other.label),
            ));
        }
        self.parent = other.parent.clone();
        self.left = other.left.clone();
        self.right = other.right.clone();
        self.height = other.height.clone();
        Ok(())
    }

    /// Resets the tree to the deterministic ladder shape over its own taxa.
    pub fn reset_to_ladder(&mut self, root_height: f64) -> Result<(), MscError> {
        let fresh = Self::ladder(self.id, self.label.clone(), self.taxa.clone(), root_height)?;
        self.assign_from(&fresh)
    }

    /// Checks the structural invariants of the flat representation.
    pub fn validate(&self) -> Result<(), MscError> {
        let n = self.leaf_count();
        let node_count = 2 * n - 1;
        if self.parent.len() != node_count
            || self.left.len() != node_count
            || self.right.len() != node_count
            || self.height.len() != node_count
        {
            return Err(self.structural_error("array-size", "node arrays disagree with taxon count"));
        }
        let root = node_count - 1;
        if self.parent[root].is_some() {
            return Err(self.structural_error("root-has-parent", "the last node must be the root"));
        }
        for node in 0..node_count {
            if !self.height[node].is_finite() {
                return Err(self.structural_error("non-finite-height", "node heights must be finite"));
            }
            if node != root {
                let p = match self.parent[node] {
                    Some(p) if p >= n && p < node_count => p,
                    _ => {
                        return Err(self
                            .structural_error("bad-parent-link", "non-root node needs an internal parent"))
                    }
                };
                if self.left[p] != Some(node) && self.right[p] != Some(node) {
                    return Err(
                        self.structural_error("unlinked-parent", "parent does not list node as a child")
                    );
                }
                if self.height[p] < self.height[node] {
                    return Err(
                        self.structural_error("parent-below-child", "parent height below child height")
                    );
                }
            }
            if self.is_leaf(node) {
                if self.left[node].is_some() || self.right[node].is_some() {
                    return Err(self.structural_error("leaf-has-children", "leaves cannot have children"));
                }
            } else {
                let (l, r) = match (self.left[node], self.right[node]) {
                    (Some(l), Some(r)) if l < node_count && r < node_count && l != r => (l, r),
                    _ => {
                        return Err(self
                            .structural_error("bad-child-links", "internal node needs two distinct children"))
                    }
                };
                if self.parent[l] != Some(node) || self.parent[r] != Some(node) {
                    return Err(
                        self.structural_error("unlinked-child", "child does not list node as its parent")
                    );
                }
            }
        }
        // Mutual parent/child links can still encode detached cycles.
        let mut seen = vec![false; node_count];
        let mut stack = vec![root];
        let mut reached = 0usize;
        while let Some(node) = stack.pop() {
            if seen[node] {
                continue;
            }
            seen[node] = true;
            reached += 1;
            if let (Some(l), Some(r)) = (self.left[node], self.right[node]) {
                stack.push(l);
                stack.push(r);
            }
        }
        if reached != node_count {
            return Err(self.structural_error("detached-nodes", "not all nodes are reachable from the root"));
        }
        Ok(())
    }

    fn unknown_node(&self, node: usize) -> MscError {
        unknown_node_error(&self.label, node, self.node_count())
    }

    fn structural_error(&self, code: &str, message: &str) -> MscError {
        MscError::Tree(ErrorInfo::new(code, message).with_context("tree", &self.label))
    }
}

fn unknown_node_error(label: &str, node: usize, count: usize) -> MscError {
    MscError::Tree(
        ErrorInfo::new("unknown-node", "node index out of range")
            .with_context("tree", label)
            .with_context("node", node)
            .with_context("count", count),
    )
}
