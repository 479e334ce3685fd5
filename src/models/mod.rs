//! # Models
//!
//! A model wires layers into a network that maps a batch of inputs and
//! target labels to a scalar loss.
//!
//! - [`Cbow`]: word2vec CBOW trained with negative sampling
//! - [`SimpleCbow`]: CBOW with a full softmax over the vocabulary
//! - [`TwoLayerNet`]: `Affine -> activation -> Affine -> softmax` classifier

pub mod cbow;
pub mod simple_cbow;
pub mod two_layer_net;

pub use cbow::Cbow;
pub use simple_cbow::SimpleCbow;
pub use two_layer_net::{Activation, TwoLayerNet};

use crate::error::{NnError, Result};
use crate::nn::ParamSet;
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Standard deviation of the initial weights.
pub const WEIGHT_INIT_STD: f64 = 0.01;

/// A trainable network.
///
/// `params()` may list the same shared weight several times; the trainer
/// merges such entries before the optimizer step.
pub trait Model: ParamSet {
    /// Runs the network on inputs `x` with labels `t` and returns the loss.
    fn forward(&mut self, x: &Array2<f64>, t: &Array2<f64>) -> f64;

    /// Computes the gradients of the last loss.
    fn backward(&mut self);
}

/// Matrix of independent `N(0, WEIGHT_INIT_STD²)` samples.
pub(crate) fn init_weight<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Result<Array2<f64>> {
    let normal = Normal::new(0.0, WEIGHT_INIT_STD).map_err(|e| NnError::InvalidConfig(e.to_string()))?;
    Ok(Array2::from_shape_fn((rows, cols), |_| normal.sample(rng)))
}

pub(crate) fn ensure_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(NnError::InvalidConfig(format!("{} must be positive", name)));
    }
    Ok(())
}
