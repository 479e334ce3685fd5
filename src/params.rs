//! Trainable parameter records.
//!
//! A layer owns its parameters as a [`Param`]. The main weight sits behind
//! an [`Arc`] so several layers can alias one logical tensor: two layers
//! built from the same [`SharedMatrix`] hold the *same* allocation, and the
//! trainer recognises them by pointer identity. Weights are never mutated
//! in place. An update produces a fresh `Arc` which is then handed to every
//! former owner.

use crate::error::{fatal, fmt_shape, NnError};
use ndarray::{Array1, Array2, ArrayView2};
use std::sync::Arc;

/// Shared, immutable weight matrix.
pub type SharedMatrix = Arc<Array2<f64>>;

/// Wraps a matrix so it can be passed to several layers.
pub fn shared(m: Array2<f64>) -> SharedMatrix {
    Arc::new(m)
}

/// Current trainable state of one layer.
#[derive(Debug, Clone)]
pub struct Param {
    pub weight: SharedMatrix,
    /// Recurrent (hidden-to-hidden) weight, used by RNN cells.
    pub weight_h: Option<Array2<f64>>,
    pub bias: Option<Array1<f64>>,
}

impl Param {
    pub fn new(weight: SharedMatrix) -> Self {
        Self {
            weight,
            weight_h: None,
            bias: None,
        }
    }

    pub fn with_bias(weight: SharedMatrix, bias: Array1<f64>) -> Self {
        Self {
            weight,
            weight_h: None,
            bias: Some(bias),
        }
    }

    /// True when both records point at the same weight allocation.
    pub fn shares_weight(&self, other: &Param) -> bool {
        Arc::ptr_eq(&self.weight, &other.weight)
    }

    /// Verifies that `next` can replace `self` without changing any shape.
    #[track_caller]
    pub(crate) fn check_replacement(&self, op: &'static str, next: &Param) {
        if self.weight.dim() != next.weight.dim() {
            fatal(NnError::shape(
                op,
                fmt_shape(self.weight.shape()),
                fmt_shape(next.weight.shape()),
            ));
        }
        let same_h = match (&self.weight_h, &next.weight_h) {
            (Some(a), Some(b)) => a.dim() == b.dim(),
            (None, None) => true,
            _ => false,
        };
        let same_b = match (&self.bias, &next.bias) {
            (Some(a), Some(b)) => a.len() == b.len(),
            (None, None) => true,
            _ => false,
        };
        if !same_h || !same_b {
            fatal(NnError::shape(
                op,
                "parameter layout of the existing layer",
                "a parameter with different optional fields",
            ));
        }
    }
}

/// Gradient of the loss with respect to one [`Param`].
#[derive(Debug, Clone)]
pub struct Grad {
    pub weight: Array2<f64>,
    pub weight_h: Option<Array2<f64>>,
    pub bias: Option<Array1<f64>>,
}

impl Grad {
    pub fn new(weight: Array2<f64>) -> Self {
        Self {
            weight,
            weight_h: None,
            bias: None,
        }
    }

    /// Zero gradient shaped like `param`.
    pub fn zeros_like(param: &Param) -> Self {
        Self {
            weight: Array2::zeros(param.weight.raw_dim()),
            weight_h: param.weight_h.as_ref().map(|w| Array2::zeros(w.raw_dim())),
            bias: param.bias.as_ref().map(|b| Array1::zeros(b.len())),
        }
    }

    /// Element-wise accumulation of another gradient of the same layout.
    pub fn accumulate(&mut self, other: &Grad) {
        if self.weight.dim() != other.weight.dim() {
            fatal(NnError::shape(
                "Grad::accumulate",
                fmt_shape(self.weight.shape()),
                fmt_shape(other.weight.shape()),
            ));
        }
        self.weight += &other.weight;
        if let (Some(a), Some(b)) = (self.weight_h.as_mut(), other.weight_h.as_ref()) {
            *a += b;
        }
        if let (Some(a), Some(b)) = (self.bias.as_mut(), other.bias.as_ref()) {
            *a += b;
        }
    }
}

/// Converts a matrix of integer-valued floats into indices.
///
/// Word IDs travel through the layer API inside `f64` matrices; anything
/// that is not a finite non-negative integer is rejected.
#[track_caller]
pub(crate) fn to_indices(op: &'static str, ids: ArrayView2<f64>) -> Vec<usize> {
    ids.iter()
        .map(|&v| {
            if !v.is_finite() || v < 0.0 || v.fract() != 0.0 {
                fatal(NnError::representation(
                    op,
                    format!("expected a non-negative integer id, got {}", v),
                ));
            }
            v as usize
        })
        .collect()
}

/// Converts indices into an `N x 1` column of `f64` ids.
pub fn ids_column(ids: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((ids.len(), 1), |(i, _)| ids[i] as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_shares_weight_is_identity_not_equality() {
        let w = shared(array![[1.0, 2.0]]);
        let a = Param::new(Arc::clone(&w));
        let b = Param::new(Arc::clone(&w));
        let c = Param::new(shared(array![[1.0, 2.0]]));
        assert!(a.shares_weight(&b));
        assert!(!a.shares_weight(&c));
    }

    #[test]
    fn test_grad_accumulate() {
        let mut g = Grad {
            weight: array![[1.0, 1.0]],
            weight_h: None,
            bias: Some(array![1.0]),
        };
        let other = Grad {
            weight: array![[2.0, 3.0]],
            weight_h: None,
            bias: Some(array![4.0]),
        };
        g.accumulate(&other);
        assert_eq!(g.weight, array![[3.0, 4.0]]);
        assert_eq!(g.bias.unwrap(), array![5.0]);
    }

    #[test]
    fn test_to_indices() {
        let ids = array![[1.0, 0.0], [3.0, 2.0]];
        assert_eq!(to_indices("test", ids.view()), vec![1, 0, 3, 2]);
    }

    #[test]
    #[should_panic(expected = "invalid data representation")]
    fn test_to_indices_rejects_fractional() {
        let ids = array![[1.5]];
        to_indices("test", ids.view());
    }

    #[test]
    #[should_panic(expected = "shape mismatch")]
    fn test_replacement_shape_checked() {
        let a = Param::new(shared(Array2::zeros((2, 2))));
        let b = Param::new(shared(Array2::zeros((3, 2))));
        a.check_replacement("test", &b);
    }
}
