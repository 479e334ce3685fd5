//! Collapsing aliased parameters before an optimizer step.
//!
//! Layers that share a weight each report their own [`Param`] and [`Grad`].
//! The optimizer must see the shared tensor once, with the summed
//! gradient, or it would apply several independent steps to it.

use crate::error::{fatal, NnError};
use crate::nn::layer::ensure_param_count;
use crate::params::{Grad, Param};

/// Deduplicated view of a model's parameters.
#[derive(Debug, Clone)]
pub struct MergedParams {
    pub params: Vec<Param>,
    pub grads: Vec<Grad>,
    /// For every original slot, the index of its entry in `params`.
    groups: Vec<usize>,
}

impl MergedParams {
    /// Number of entries before merging.
    pub fn slots(&self) -> usize {
        self.groups.len()
    }

    /// Group index of original slot `slot`.
    pub fn group_of(&self, slot: usize) -> Option<usize> {
        self.groups.get(slot).copied()
    }

    /// Maps optimizer output back onto the original slots.
    ///
    /// Slots that were merged receive clones of one record, so their
    /// weights are the same `Arc` again.
    pub fn expand(&self, updated: Vec<Param>) -> Vec<Param> {
        ensure_param_count("MergedParams::expand", self.params.len(), updated.len());
        self.groups.iter().map(|&g| updated[g].clone()).collect()
    }
}

/// Groups entries whose weights are the same allocation.
///
/// The first occurrence of each weight keeps its position and its gradient
/// becomes the sum of the whole group. Order of first occurrences is
/// preserved.
///
/// Only the main weight may be shared. A group whose members carry their
/// own bias or recurrent weight cannot be expressed as one update and
/// aborts.
pub fn merge_shared(params: &[Param], grads: &[Grad]) -> MergedParams {
    ensure_param_count("merge_shared", params.len(), grads.len());

    let mut merged_params: Vec<Param> = Vec::with_capacity(params.len());
    let mut merged_grads: Vec<Grad> = Vec::with_capacity(grads.len());
    let mut groups = Vec::with_capacity(params.len());

    for (param, grad) in params.iter().zip(grads) {
        match merged_params.iter().position(|p| p.shares_weight(param)) {
            Some(g) => {
                let owns_secondary = |p: &Param| p.weight_h.is_some() || p.bias.is_some();
                if owns_secondary(&merged_params[g]) || owns_secondary(param) {
                    fatal(NnError::representation(
                        "merge_shared",
                        "layers sharing a weight also own a bias or recurrent weight",
                    ));
                }
                merged_grads[g].accumulate(grad);
                groups.push(g);
            }
            None => {
                groups.push(merged_params.len());
                merged_params.push(param.clone());
                merged_grads.push(grad.clone());
            }
        }
    }

    log::trace!("merged {} parameter slots into {}", params.len(), merged_params.len());
    MergedParams {
        params: merged_params,
        grads: merged_grads,
        groups,
    }
}
