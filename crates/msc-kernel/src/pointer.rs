use msc_core::errors::{ErrorInfo, MscError};
use msc_core::params::IntegerParameter;
use msc_core::{StateNodeId, TreeId};
use serde::{Deserialize, Serialize};

use crate::kernel::GeneTreeKernel;

/// State node standing in for one observed gene tree.
///
/// A pointer tree holds no structure of its own. It resolves through its slot
/// in the shared indicator parameter to one kernel member, and the member it
/// resolves to changes whenever an operator rewrites the indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerTree {
    /// State node identity of the pointer tree.
    pub id: StateNodeId,
    /// Human readable label used in logs and diagnostics.
    pub label: String,
    slot: usize,
}

impl PointerTree {
    /// Creates a pointer reading the given indicator slot.
    pub fn new(id: StateNodeId, label: impl Into<String>, slot: usize) -> Self {
        Self {
            id,
            label: label.into(),
            slot,
        }
    }

    /// Returns the indicator slot this pointer reads.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Resolves the pointer to the kernel member it currently selects.
    pub fn resolve(
        &self,
        indicator: &IntegerParameter,
        kernel: &GeneTreeKernel,
    ) -> Result<TreeId, MscError> {
        let index = indicator.index_value(self.slot)?;
        if index >= kernel.size() {
            return Err(MscError::Kernel(
                ErrorInfo::new("pointer-outside-kernel", "indicator points past the kernel")
                    .with_context("pointer", &self.label)
                    .with_context("slot", self.slot)
                    .with_context("index", index)
                    .with_context("kernel-size", kernel.size()),
            ));
        }
        kernel.tree_at(index)
    }
}
