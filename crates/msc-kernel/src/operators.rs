//! Concrete proposal operators over gene tree working sets.

use msc_core::errors::{ErrorInfo, MscError};
use msc_core::rng::RngHandle;
use msc_core::{KernelPriorId, StateNodeId};

use crate::operator::{GeneTreeOperator, OperatorBase, TreeProposal, TreeSource};
use crate::state::ModelState;

/// Moves one non-root internal node height uniformly within its bounds.
#[derive(Debug, Clone)]
pub struct UniformNodeHeight {
    base: OperatorBase,
}

impl UniformNodeHeight {
    /// Creates the operator over the given working set.
    pub fn new(base: OperatorBase) -> Self {
        Self { base }
    }
}

impl GeneTreeOperator for UniformNodeHeight {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn propose(
        &mut self,
        state: &mut ModelState,
        rng: &mut RngHandle,
    ) -> Result<TreeProposal, MscError> {
        let tree_id = self.base.sample_tree(state, rng)?;
        let tree = state.trees.get_mut(tree_id)?;
        if tree.internal_node_count() == 1 {
            return Ok(TreeProposal::rejected(format!(
                "uniform-height:t{}:single-internal",
                tree_id.as_raw()
            )));
        }
        // Root excluded: it has no parent to bound the move from above.
        let candidates = tree.internal_node_count() - 1;
        let node = tree.leaf_count() + rng.next_index(candidates);
        let parent = tree.parent(node)?.ok_or_else(|| {
            MscError::Tree(
                ErrorInfo::new("missing-parent", "sampled internal node has no parent")
                    .with_context("node", node),
            )
        })?;
        let upper = tree.height(parent)?;
        let lower = tree.max_child_height(node)?;
        let height = lower + rng.next_f64() * (upper - lower);
        tree.set_height(node, height)?;
        Ok(TreeProposal {
            log_hastings: 0.0,
            tree: Some(tree_id),
            description: format!("uniform-height:t{}:n{}", tree_id.as_raw(), node),
        })
    }
}

/// Scales a sampled tree, either as a whole or the root height alone.
#[derive(Debug, Clone)]
pub struct TreeScale {
    base: OperatorBase,
    scale_factor: f64,
    root_only: bool,
}

impl TreeScale {
    /// Creates the operator. `scale_factor` must lie strictly in `(0, 1)`.
    pub fn new(base: OperatorBase, scale_factor: f64, root_only: bool) -> Result<Self, MscError> {
        if !(scale_factor > 0.0 && scale_factor < 1.0) {
            return Err(MscError::Config(
                ErrorInfo::new("scale-factor-range", "scale factor must lie strictly in (0, 1)")
                    .with_context("operator", &base.label)
                    .with_context("factor", scale_factor),
            ));
        }
        Ok(Self {
            base,
            scale_factor,
            root_only,
        })
    }

    fn draw_scale(&self, rng: &mut RngHandle) -> f64 {
        let s = self.scale_factor;
        s + rng.next_f64() * (1.0 / s - s)
    }
}

impl GeneTreeOperator for TreeScale {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn propose(
        &mut self,
        state: &mut ModelState,
        rng: &mut RngHandle,
    ) -> Result<TreeProposal, MscError> {
        let tree_id = self.base.sample_tree(state, rng)?;
        let scale = self.draw_scale(rng);
        let tree = state.trees.get_mut(tree_id)?;
        if self.root_only {
            let root = tree.root();
            let proposed = tree.height(root)? * scale;
            if proposed < tree.max_child_height(root)? {
                return Ok(TreeProposal::rejected(format!(
                    "tree-scale:t{}:root-below-child",
                    tree_id.as_raw()
                )));
            }
            tree.set_height(root, proposed)?;
            return Ok(TreeProposal {
                log_hastings: scale.ln(),
                tree: Some(tree_id),
                description: format!("tree-scale:t{}:root", tree_id.as_raw()),
            });
        }
        match tree.scale(scale) {
            Ok(scaled) => Ok(TreeProposal {
                log_hastings: scale.ln() * scaled as f64,
                tree: Some(tree_id),
                description: format!("tree-scale:t{}:full", tree_id.as_raw()),
            }),
            Err(err) if err.info().code == "scale-inverts-order" => Ok(TreeProposal::rejected(
                format!("tree-scale:t{}:inverts-order", tree_id.as_raw()),
            )),
            Err(err) => Err(err),
        }
    }
}

/// Grows or shrinks the gene tree kernel by one member tree.
///
/// Expanding copies a uniformly chosen member, appends the copy and
/// reassigns each pointer to it with Poisson-controlled probability.
/// Contracting deletes a uniformly chosen member, renumbers the surviving
/// indicator entries and reassigns orphaned pointers uniformly. Both
/// directions keep the kernel-size parameter and the indicator bounds in
/// step and return the Hastings ratio of the dimension change.
#[derive(Debug, Clone)]
pub struct KernelExpander {
    base: OperatorBase,
    prior: KernelPriorId,
    poisson_scale: f64,
}

impl KernelExpander {
    /// Creates the operator. The base must be in kernel mode.
    pub fn new(base: OperatorBase, poisson_scale: f64) -> Result<Self, MscError> {
        let prior = match base.source() {
            TreeSource::Kernel(prior) => *prior,
            TreeSource::Fixed(_) => {
                return Err(MscError::Config(
                    ErrorInfo::new("expander-needs-kernel", "the resize move only works on a kernel source")
                        .with_context("operator", &base.label),
                ))
            }
        };
        if !poisson_scale.is_finite() || poisson_scale <= 0.0 {
            return Err(MscError::Config(
                ErrorInfo::new("poisson-scale-range", "the poisson scale must be positive and finite")
                    .with_context("operator", &base.label)
                    .with_context("scale", poisson_scale),
            ));
        }
        Ok(Self {
            base,
            prior,
            poisson_scale,
        })
    }
}

impl GeneTreeOperator for KernelExpander {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn declared_state_nodes(&self, state: &ModelState) -> Result<Vec<StateNodeId>, MscError> {
        let prior = state.prior(self.prior)?;
        Ok(vec![prior.size().id, prior.indicator().id])
    }

    fn propose(
        &mut self,
        state: &mut ModelState,
        rng: &mut RngHandle,
    ) -> Result<TreeProposal, MscError> {
        // Refresh the working set; this also registers the pending edit.
        let links = self.base.links(state)?;
        let original_size = links.len();

        let (lower, upper) = {
            let prior = state.prior(self.prior)?;
            let size_value = prior.size().value(0)?;
            if size_value != original_size as i64 {
                return Err(MscError::Kernel(
                    ErrorInfo::new(
                        "kernel-size-mismatch",
                        "kernel membership disagrees with the size parameter",
                    )
                    .with_context("prior", &prior.label)
                    .with_context("members", original_size)
                    .with_context("size-parameter", size_value),
                ));
            }
            (prior.size().lower(), prior.size().upper())
        };

        let mut expanding = rng.next_f64() < 0.5;
        if original_size as i64 == lower {
            expanding = true;
        } else if original_size as i64 == upper {
            expanding = false;
        }

        let proposed_size = if expanding {
            original_size + 1
        } else {
            original_size - 1
        };
        let pointer_count = state.prior(self.prior)?.pointers().len();
        let denominator = if expanding { original_size } else { proposed_size };
        let poisson_rate = self.poisson_scale * pointer_count as f64 / denominator as f64;

        let mut log_q_expand = 0.0;
        let mut log_q_contract = 0.0;
        let mut reassigned = 0usize;
        let touched;

        if expanding {
            let new_index = proposed_size - 1;
            let copy_index = rng.next_index(original_size);
            let source_id = links[copy_index].tree;
            let copy_id = state.allocate_state_node_id();
            let mut copy = state.trees.get(source_id)?.clone();
            let copy_label = format!("{}-m{}", copy.label, copy_id.as_raw());
            copy.id = copy_id;
            copy.label = copy_label;
            let new_tree = state.insert_tree(copy);
            touched = Some(new_tree);

            let prior = state.prior_mut(self.prior)?;
            prior.add_member(new_tree);
            prior.indicator_mut().set_upper(new_index as i64);
            let slots: Vec<usize> = prior.pointers().iter().map(|p| p.slot()).collect();
            for slot in slots {
                if rng.next_exponential(poisson_rate) < 1.0 {
                    prior.indicator_mut().set_value(slot, new_index as i64)?;
                    reassigned += 1;
                }
            }

            log_q_expand -= (original_size as f64).ln();
            log_q_contract -= (proposed_size as f64).ln();
            log_q_contract -= reassigned as f64 * (original_size as f64).ln();
        } else {
            let delete_index = rng.next_index(original_size);
            let prior = state.prior_mut(self.prior)?;
            let slots: Vec<usize> = prior.pointers().iter().map(|p| p.slot()).collect();
            for slot in slots {
                let value = prior.indicator().index_value(slot)?;
                if value < delete_index {
                    continue;
                }
                let proposed = if value == delete_index {
                    // Orphaned pointer: reassign uniformly among survivors.
                    let mut candidate =
                        (delete_index + 1 + rng.next_index(original_size - 1)) % original_size;
                    if candidate > delete_index {
                        candidate -= 1;
                    }
                    reassigned += 1;
                    candidate
                } else {
                    value - 1
                };
                prior.indicator_mut().set_value(slot, proposed as i64)?;
            }
            let removed = prior.remove_member(delete_index)?;
            prior.indicator_mut().set_upper(proposed_size as i64 - 1);
            state.trees.remove(removed)?;
            touched = None;

            log_q_expand -= (proposed_size as f64).ln();
            log_q_contract -= (original_size as f64).ln();
            log_q_contract -= reassigned as f64 * (proposed_size as f64).ln();
        }

        state
            .prior_mut(self.prior)?
            .size_mut()
            .set_value(0, proposed_size as i64)?;

        // Poisson weight of drawing this many reassignments while expanding.
        log_q_expand +=
            reassigned as f64 * poisson_rate.ln() - poisson_rate - ln_factorial(reassigned);

        let log_hastings = if expanding {
            log_q_contract - log_q_expand
        } else {
            log_q_expand - log_q_contract
        };
        let kind = if expanding { "kernel-expand" } else { "kernel-contract" };
        Ok(TreeProposal {
            log_hastings,
            tree: touched,
            description: format!("{}:{}->{}", kind, original_size, proposed_size),
        })
    }
}

fn ln_factorial(n: usize) -> f64 {
    (2..=n).map(|k| (k as f64).ln()).sum()
}
