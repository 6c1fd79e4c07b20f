#![deny(missing_docs)]

//! Gene tree kernel state, the kernel prior and the kernel-aware operator
//! base with its concrete tree operators.

mod kernel;
mod link;
mod operator;
mod operators;
mod pointer;
mod prior;
mod state;

pub use kernel::GeneTreeKernel;
pub use link::GeneTreeLink;
pub use operator::{GeneTreeOperator, OperatorBase, RejectReason, TreeProposal, TreeSource};
pub use operators::{KernelExpander, TreeScale, UniformNodeHeight};
pub use pointer::PointerTree;
pub use prior::KernelPrior;
pub use state::ModelState;
