//! Base contracts for layers with hand-written backward passes.
//!
//! Every layer caches what it needs during `forward` and consumes that cache
//! in `backward`. Gradients stay inside the layer until the trainer collects
//! them through [`Parameterized::grad`].

use crate::error::{fatal, NnError};
use crate::params::{Grad, Param};
use ndarray::Array2;

/// Access to the trainable state of a layer.
///
/// The defaults describe a layer without parameters.
pub trait Parameterized {
    /// Returns a copy of the current parameter record.
    fn param(&self) -> Option<Param> {
        None
    }

    /// Returns the gradient computed by the last backward pass.
    fn grad(&self) -> Option<Grad> {
        None
    }

    /// Replaces the parameter record wholesale. The shapes must not change.
    fn set_param(&mut self, _param: Param) {}
}

/// A differentiable transformation of a 2-D batch.
pub trait Layer: Parameterized {
    fn forward(&mut self, x: &Array2<f64>) -> Array2<f64>;

    /// Propagates `dout` (the gradient w.r.t. this layer's output) and
    /// returns the gradient w.r.t. the input of the matching `forward`.
    fn backward(&mut self, dout: &Array2<f64>) -> Array2<f64>;
}

/// Final layer that turns scores and target labels into a scalar loss.
pub trait LossLayer {
    fn forward(&mut self, x: &Array2<f64>, t: &Array2<f64>) -> f64;

    /// Gradient of the last loss w.r.t. the scores (upstream gradient is 1).
    fn backward(&mut self) -> Array2<f64>;
}

/// A collection of parameterized slots: a composite layer or a model.
///
/// `params()` and `grads()` list one entry per parameterized slot in a fixed
/// order, aliases included. `update_params` takes exactly that many entries
/// in the same order.
pub trait ParamSet {
    fn params(&self) -> Vec<Param>;
    fn grads(&self) -> Vec<Grad>;
    fn update_params(&mut self, params: Vec<Param>);
}

/// Returns the value cached by `forward`, or aborts if there is none.
#[track_caller]
pub(crate) fn cached<'a, T>(op: &'static str, slot: &'a Option<T>) -> &'a T {
    match slot {
        Some(v) => v,
        None => fatal(NnError::representation(op, "backward called before forward")),
    }
}

/// Aborts unless an update carries one parameter per slot.
#[track_caller]
pub(crate) fn ensure_param_count(op: &'static str, expected: usize, actual: usize) {
    if expected != actual {
        fatal(NnError::shape(
            op,
            format!("{} parameters", expected),
            format!("{} parameters", actual),
        ));
    }
}
