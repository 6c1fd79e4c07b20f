use msc_core::errors::{ErrorInfo, MscError};
use msc_core::rng::RngHandle;
use msc_core::{KernelPriorId, OperatorId, StateNodeId, TreeId};
use serde::{Deserialize, Serialize};

use crate::link::GeneTreeLink;
use crate::state::ModelState;

/// The two mutually exclusive ways an operator obtains its working tree set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeSource {
    /// A literal, run-constant list of links.
    Fixed(Vec<GeneTreeLink>),
    /// A kernel prior whose membership changes between proposals.
    Kernel(KernelPriorId),
}

impl TreeSource {
    /// Resolves the fixed-list/kernel configuration into a source.
    ///
    /// Exactly one of `fixed` and `kernel` must be given. Fixed links are
    /// dereferenced eagerly; kernel resolution is deferred to each proposal
    /// because the membership is not stable.
    pub fn configure(
        fixed: Vec<GeneTreeLink>,
        kernel: Option<KernelPriorId>,
        state: &ModelState,
    ) -> Result<Self, MscError> {
        match (fixed.is_empty(), kernel) {
            (true, None) => Err(MscError::Config(ErrorInfo::new(
                "missing-tree-source",
                "an operator needs either fixed links or a kernel prior",
            ))),
            (false, Some(_)) => Err(MscError::Config(ErrorInfo::new(
                "ambiguous-tree-source",
                "fixed links and a kernel prior are mutually exclusive",
            ))),
            (false, None) => {
                for (index, link) in fixed.iter().enumerate() {
                    if !state.trees.contains(link.tree) {
                        return Err(MscError::Config(
                            ErrorInfo::new("unresolvable-link", "fixed link names a tree that does not exist")
                                .with_context("link", index)
                                .with_context("tree-id", link.tree.as_raw()),
                        ));
                    }
                }
                Ok(Self::Fixed(fixed))
            }
            (true, Some(prior)) => {
                state.prior(prior)?;
                Ok(Self::Kernel(prior))
            }
        }
    }
}

/// Shared working-set plumbing embedded by every concrete tree operator.
///
/// All queries resolve freshly against the current state. Counts, links and
/// state node lists must never be cached across proposals: in kernel mode
/// every one of them can change while the run is sampling.
#[derive(Debug, Clone)]
pub struct OperatorBase {
    /// Identity forwarded verbatim to the kernel prior on link queries.
    pub id: OperatorId,
    /// Human readable label used in diagnostics and proposal descriptions.
    pub label: String,
    source: TreeSource,
}

impl OperatorBase {
    /// Creates a base over the given source.
    pub fn new(id: OperatorId, label: impl Into<String>, source: TreeSource) -> Self {
        Self {
            id,
            label: label.into(),
            source,
        }
    }

    /// Returns the configured source.
    pub fn source(&self) -> &TreeSource {
        &self.source
    }

    /// Returns the current number of trees in the working set.
    pub fn tree_count(&self, state: &ModelState) -> Result<usize, MscError> {
        match &self.source {
            TreeSource::Fixed(links) => Ok(links.len()),
            TreeSource::Kernel(prior) => Ok(state.prior(*prior)?.link_count()),
        }
    }

    /// Returns the current working set as a fresh link sequence.
    ///
    /// In kernel mode this registers the operator as the kernel's editor and
    /// dereferences every member; a dead member is a kernel consistency
    /// error, never skipped.
    pub fn links(&self, state: &mut ModelState) -> Result<Vec<GeneTreeLink>, MscError> {
        match &self.source {
            TreeSource::Fixed(links) => Ok(links.clone()),
            TreeSource::Kernel(prior_id) => {
                let (prior, trees) = state.prior_with_trees_mut(*prior_id)?;
                prior.current_links_for(self.id, trees)
            }
        }
    }

    /// Samples one tree uniformly from the current working set.
    ///
    /// The returned tree may be mutated by the enclosing proposal. The
    /// working set is refreshed first, so the draw always covers the current
    /// membership.
    pub fn sample_tree(
        &self,
        state: &mut ModelState,
        rng: &mut RngHandle,
    ) -> Result<TreeId, MscError> {
        let links = self.links(state)?;
        if links.is_empty() {
            return Err(MscError::InvalidState(
                ErrorInfo::new("empty-working-set", "no trees are available to operate on")
                    .with_context("operator", &self.label),
            ));
        }
        let index = rng.next_index(links.len());
        Ok(links[index].tree)
    }

    /// The complete current set of state nodes a proposal may touch.
    ///
    /// Union of the operator-declared nodes and the source-derived nodes: the
    /// fixed trees in fixed mode, the kernel plus every pointer tree in
    /// kernel mode. Recomputed on every call.
    pub fn mutable_state_nodes(
        &self,
        state: &ModelState,
        declared: &[StateNodeId],
    ) -> Result<Vec<StateNodeId>, MscError> {
        let mut nodes = Vec::new();
        for &id in declared {
            push_unique(&mut nodes, id);
        }
        match &self.source {
            TreeSource::Fixed(links) => {
                for link in links {
                    push_unique(&mut nodes, state.trees.state_node_of(link.tree)?);
                }
            }
            TreeSource::Kernel(prior) => {
                for id in state.prior(*prior)?.owned_state_nodes() {
                    push_unique(&mut nodes, id);
                }
            }
        }
        Ok(nodes)
    }
}

fn push_unique(nodes: &mut Vec<StateNodeId>, id: StateNodeId) {
    if !nodes.contains(&id) {
        nodes.push(id);
    }
}

/// Outcome of one proposal.
#[derive(Debug, Clone)]
pub struct TreeProposal {
    /// Log Hastings ratio of the move. Negative infinity rejects outright.
    pub log_hastings: f64,
    /// The tree the move touched, when a single tree was involved.
    pub tree: Option<TreeId>,
    /// Human readable description of the move.
    pub description: String,
}

impl TreeProposal {
    /// A proposal the host should discard without an acceptance draw.
    pub fn rejected(description: impl Into<String>) -> Self {
        Self {
            log_hastings: f64::NEG_INFINITY,
            tree: None,
            description: description.into(),
        }
    }

    /// Returns whether the move rejected itself.
    pub fn is_rejected(&self) -> bool {
        self.log_hastings == f64::NEG_INFINITY
    }
}

/// Host verdict passed back to an operator after a failed proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The acceptance draw turned the proposal down.
    Declined,
    /// The proposed state violated a hard constraint.
    Invalid,
}

/// A proposal operator over a working set of gene trees.
///
/// Implementations embed an [`OperatorBase`] and resolve their working set
/// through it at the start of every proposal. Accept and reject are
/// pass-through notifications; any bookkeeping happens lazily on the next
/// working-set query.
pub trait GeneTreeOperator {
    /// Shared working-set plumbing.
    fn base(&self) -> &OperatorBase;

    /// Label used in logs and proposal descriptions.
    fn label(&self) -> &str {
        &self.base().label
    }

    /// State nodes this operator mutates beyond the working set itself.
    fn declared_state_nodes(&self, _state: &ModelState) -> Result<Vec<StateNodeId>, MscError> {
        Ok(Vec::new())
    }

    /// Proposes a state change, returning its log Hastings ratio.
    fn propose(
        &mut self,
        state: &mut ModelState,
        rng: &mut RngHandle,
    ) -> Result<TreeProposal, MscError>;

    /// The complete set of state nodes an accept or reject may touch.
    fn mutable_state_nodes(&self, state: &ModelState) -> Result<Vec<StateNodeId>, MscError> {
        let declared = self.declared_state_nodes(state)?;
        self.base().mutable_state_nodes(state, &declared)
    }

    /// Notification that the proposal was accepted.
    fn accept(&mut self) {}

    /// Notification that the proposal was rejected.
    fn reject(&mut self, _reason: RejectReason) {}
}
