use msc_core::errors::{ErrorInfo, MscError};
use msc_core::params::IntegerParameter;
use msc_core::{DistId, KernelPriorId, OperatorId, StateNodeId, TreeId};
use msc_tree::TreeStore;
use serde::{Deserialize, Serialize};

use crate::kernel::GeneTreeKernel;
use crate::link::GeneTreeLink;
use crate::pointer::PointerTree;

/// Prior over a dynamically sized kernel of gene trees.
///
/// Owns the kernel state node, the kernel-size parameter, the indicator
/// parameter and the pointer trees that resolve through it. Created at
/// configuration time, mutated continuously by resize moves, never destroyed
/// before the run ends. Operators read it only through fresh per-call link
/// snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelPrior {
    /// Identity of the prior in the model's prior arena.
    pub id: KernelPriorId,
    /// Human readable label used in logs and diagnostics.
    pub label: String,
    /// Distribution term shared by every kernel member link.
    pub term: DistId,
    kernel: GeneTreeKernel,
    size: IntegerParameter,
    indicator: IntegerParameter,
    pointers: Vec<PointerTree>,
}

impl KernelPrior {
    /// Assembles a prior, forcing bounds and validating the configuration.
    ///
    /// The kernel-size lower bound is raised to one, the indicator bounds are
    /// set to `[0, size - 1]`, and every pointer must already resolve to a
    /// kernel member.
    pub fn new(
        id: KernelPriorId,
        label: impl Into<String>,
        term: DistId,
        kernel: GeneTreeKernel,
        mut size: IntegerParameter,
        mut indicator: IntegerParameter,
        pointers: Vec<PointerTree>,
    ) -> Result<Self, MscError> {
        let label = label.into();
        if kernel.is_empty() {
            return Err(config_error(&label, "empty-kernel", "the kernel needs at least one member tree"));
        }
        if pointers.is_empty() {
            return Err(config_error(&label, "no-pointers", "the prior needs at least one pointer tree"));
        }
        if size.dimension() != 1 {
            return Err(config_error(&label, "kernel-size-dimension", "the kernel-size parameter must be scalar"));
        }
        if size.lower() < 1 {
            size.set_lower(1);
        }
        if size.value(0)? != kernel.size() as i64 {
            return Err(MscError::Config(
                ErrorInfo::new("kernel-size-mismatch", "the size parameter disagrees with the kernel")
                    .with_context("prior", &label)
                    .with_context("members", kernel.size())
                    .with_context("size-parameter", size.value(0)?),
            ));
        }
        if indicator.dimension() != pointers.len() {
            return Err(config_error(
                &label,
                "indicator-dimension",
                "the indicator needs one entry per pointer tree",
            ));
        }
        indicator.set_lower(0);
        indicator.set_upper(kernel.size() as i64 - 1);
        for pointer in &pointers {
            if pointer.slot() >= indicator.dimension() {
                return Err(config_error(&label, "pointer-slot-range", "pointer slot outside the indicator"));
            }
            pointer.resolve(&indicator, &kernel)?;
        }
        Ok(Self {
            id,
            label,
            term,
            kernel,
            size,
            indicator,
            pointers,
        })
    }

    /// Returns the kernel state node.
    pub fn kernel(&self) -> &GeneTreeKernel {
        &self.kernel
    }

    /// Returns the scalar kernel-size parameter.
    pub fn size(&self) -> &IntegerParameter {
        &self.size
    }

    /// Returns the kernel-size parameter for mutation by resize moves.
    pub fn size_mut(&mut self) -> &mut IntegerParameter {
        &mut self.size
    }

    /// Returns the indicator parameter.
    pub fn indicator(&self) -> &IntegerParameter {
        &self.indicator
    }

    /// Returns the indicator parameter for mutation by resize moves.
    pub fn indicator_mut(&mut self) -> &mut IntegerParameter {
        &mut self.indicator
    }

    /// Returns the pointer trees in slot order.
    pub fn pointers(&self) -> &[PointerTree] {
        &self.pointers
    }

    /// Returns the current number of links, one per kernel member.
    pub fn link_count(&self) -> usize {
        self.kernel.size()
    }

    /// Appends a member tree to the kernel.
    pub fn add_member(&mut self, tree: TreeId) {
        self.kernel.add_tree(tree);
    }

    /// Removes and returns the member at the given kernel index.
    pub fn remove_member(&mut self, index: usize) -> Result<TreeId, MscError> {
        self.kernel.remove_tree(index)
    }

    /// Materialises the current links without registering an editor.
    pub fn current_links(&self, store: &TreeStore) -> Result<Vec<GeneTreeLink>, MscError> {
        self.materialise_links(store)
    }

    /// Materialises the current links on behalf of an operator.
    ///
    /// Only operators should call this method. The caller identity is
    /// recorded on the kernel verbatim so a pending edit can be attributed.
    pub fn current_links_for(
        &mut self,
        caller: OperatorId,
        store: &TreeStore,
    ) -> Result<Vec<GeneTreeLink>, MscError> {
        self.kernel.begin_edit(caller);
        self.materialise_links(store)
    }

    /// State nodes the prior owns: the kernel and every pointer tree.
    pub fn owned_state_nodes(&self) -> Vec<StateNodeId> {
        let mut nodes = Vec::with_capacity(1 + self.pointers.len());
        nodes.push(self.kernel.id);
        nodes.extend(self.pointers.iter().map(|pointer| pointer.id));
        nodes
    }

    fn materialise_links(&self, store: &TreeStore) -> Result<Vec<GeneTreeLink>, MscError> {
        let mut links = Vec::with_capacity(self.kernel.size());
        for &tree in self.kernel.tree_ids() {
            if !store.contains(tree) {
                return Err(MscError::Kernel(
                    ErrorInfo::new("dead-kernel-tree", "kernel member no longer exists in the tree store")
                        .with_context("prior", &self.label)
                        .with_context("tree-id", tree.as_raw()),
                ));
            }
            links.push(GeneTreeLink::new(tree, self.term));
        }
        Ok(links)
    }
}

fn config_error(label: &str, code: &str, message: &str) -> MscError {
    MscError::Config(ErrorInfo::new(code, message).with_context("prior", label))
}
