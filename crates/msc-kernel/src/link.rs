use msc_core::{DistId, TreeId};
use serde::{Deserialize, Serialize};

/// Pairing of a gene tree with the distribution term that constrains it.
///
/// Links are the unit the operator base works over. Fixed-mode operators are
/// configured with a literal list of links; kernel-mode operators materialise
/// a fresh list from their prior at every call because kernel membership
/// changes between proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeneTreeLink {
    /// Tree the link binds.
    pub tree: TreeId,
    /// Distribution term constraining the tree.
    pub term: DistId,
}

impl GeneTreeLink {
    /// Creates a link between a tree and its distribution term.
    pub fn new(tree: TreeId, term: DistId) -> Self {
        Self { tree, term }
    }
}
