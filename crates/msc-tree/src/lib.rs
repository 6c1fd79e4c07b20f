#![deny(missing_docs)]

//! Flat-array rooted binary trees, taxon bookkeeping and tree serialisation.

mod newick;
mod store;
mod taxa;
mod tree;

pub use newick::{numeric_newick, topology_signature};
pub use store::TreeStore;
pub use taxa::{GeneTaxonMap, TaxonSet};
pub use tree::BinaryTree;
