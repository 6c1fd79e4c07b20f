//! Model graph of sampleable distributions with per-node draw flags.

use std::collections::{BTreeMap, BTreeSet};

use msc_core::errors::ErrorInfo;
use msc_core::{DistId, MscError, RngHandle};
use msc_kernel::ModelState;

/// A distribution that can draw a fresh realisation of its state nodes.
///
/// Implementations write into [`ModelState`] only. Conditions are declared
/// through [`children`](SampleableDistribution::children) so the graph can
/// realise them first.
pub trait SampleableDistribution {
    /// Human readable label used in logs and diagnostics.
    fn label(&self) -> &str;

    /// Distributions this one conditions on, in sampling order.
    fn children(&self) -> Vec<DistId>;

    /// Draws one realisation, assuming every child has been drawn already.
    fn sample(&mut self, state: &mut ModelState, rng: &mut RngHandle) -> Result<(), MscError>;
}

struct GraphNode {
    dist: Box<dyn SampleableDistribution>,
    sampled: bool,
}

/// Arena of distributions keyed by [`DistId`], tracking which nodes have
/// been drawn within the current sampling pass.
#[derive(Default)]
pub struct ModelGraph {
    nodes: BTreeMap<DistId, GraphNode>,
}

impl ModelGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a distribution under an explicit id.
    pub fn insert(
        &mut self,
        id: DistId,
        dist: Box<dyn SampleableDistribution>,
    ) -> Result<(), MscError> {
        if self.nodes.contains_key(&id) {
            return Err(MscError::Config(
                ErrorInfo::new("duplicate-distribution", "distribution id registered twice")
                    .with_context("dist-id", id.as_raw())
                    .with_context("label", dist.label()),
            ));
        }
        self.nodes.insert(
            id,
            GraphNode {
                dist,
                sampled: false,
            },
        );
        Ok(())
    }

    /// Returns the number of registered distributions.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when the graph holds no distributions.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns true when the id is registered.
    pub fn contains(&self, id: DistId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns the label of a registered distribution.
    pub fn label_of(&self, id: DistId) -> Result<&str, MscError> {
        Ok(self.node(id)?.dist.label())
    }

    /// Returns the declared children of a registered distribution.
    pub fn children_of(&self, id: DistId) -> Result<Vec<DistId>, MscError> {
        Ok(self.node(id)?.dist.children())
    }

    /// Returns whether a node has been drawn in the current pass.
    pub fn is_sampled(&self, id: DistId) -> Result<bool, MscError> {
        Ok(self.node(id)?.sampled)
    }

    /// Overrides a single node's draw flag.
    ///
    /// Loggers use this to redraw one subtree while the rest of the pass
    /// stays fixed.
    pub fn set_sampled(&mut self, id: DistId, sampled: bool) -> Result<(), MscError> {
        self.node_mut(id)?.sampled = sampled;
        Ok(())
    }

    /// Clears the draw flags of `root` and everything reachable from it.
    ///
    /// The walk keeps a visited set, so shared conditions and accidental
    /// cycles terminate. Returns the number of nodes visited.
    pub fn clear_sampled_flags(&mut self, root: DistId) -> Result<usize, MscError> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let node = self.node_mut(id)?;
            node.sampled = false;
            stack.extend(node.dist.children());
        }
        Ok(visited.len())
    }

    /// Draws a realisation of `root` and every unrealised condition below it.
    ///
    /// Each node is flagged before its children are visited and drawn after
    /// them, so conditions are realised exactly once per pass and before
    /// anything that depends on them.
    pub fn sample(
        &mut self,
        root: DistId,
        state: &mut ModelState,
        rng: &mut RngHandle,
    ) -> Result<(), MscError> {
        let (already_sampled, children) = {
            let node = self.node(root)?;
            (node.sampled, node.dist.children())
        };
        if already_sampled {
            return Ok(());
        }
        self.node_mut(root)?.sampled = true;
        for child in children {
            self.sample(child, state, rng)?;
        }
        // The node leaves the arena while its own draw runs so the draw can
        // not re-enter the graph.
        let mut node = match self.nodes.remove(&root) {
            Some(node) => node,
            None => return Err(unknown_distribution(root)),
        };
        let outcome = node.dist.sample(state, rng);
        self.nodes.insert(root, node);
        outcome
    }

    fn node(&self, id: DistId) -> Result<&GraphNode, MscError> {
        self.nodes.get(&id).ok_or_else(|| unknown_distribution(id))
    }

    fn node_mut(&mut self, id: DistId) -> Result<&mut GraphNode, MscError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| unknown_distribution(id))
    }
}

fn unknown_distribution(id: DistId) -> MscError {
    MscError::Config(
        ErrorInfo::new("unknown-distribution", "distribution id is not registered")
            .with_context("dist-id", id.as_raw()),
    )
}
