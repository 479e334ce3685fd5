// --- File: src/losses.rs ---

//! Loss layers and the numeric helpers they share.
//!
//! # Available Loss Functions
//!
//! - **Softmax cross-entropy**: [`SoftmaxWithLoss`], used for multi-class scores
//! - **Sigmoid cross-entropy**: [`SigmoidWithLoss`], used for binary scores
//!   (one column per sample), e.g. inside negative sampling
//!
//! There is exactly one definition of [`softmax`] and
//! [`cross_entropy_error`]; activation layers reuse them.

use crate::error::{fatal, fmt_shape, NnError};
use crate::nn::layer::{cached, LossLayer};
use crate::params::{ids_column, to_indices};
use ndarray::{Array1, Array2, ArrayView1};

/// Added inside `ln` so that a zero probability yields a large finite loss.
pub const LOG_EPS: f64 = 1e-7;

// ============================================================================
// Numeric helpers
// ============================================================================

/// Row-wise softmax. Each row is shifted by its maximum before exponentiation.
pub fn softmax(x: &Array2<f64>) -> Array2<f64> {
    let mut y = x.clone();
    for mut row in y.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
    y
}

/// Element-wise logistic function.
pub fn sigmoid(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax(row: ArrayView1<f64>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}

/// Resolves target labels into one class index per row of `y`.
///
/// `t` is one-hot when it has the same shape as `y`, otherwise it must be an
/// index vector of length `N` stored as `N x 1` or `1 x N`.
pub(crate) fn label_indices(op: &'static str, y: &Array2<f64>, t: &Array2<f64>) -> Vec<usize> {
    let n = y.nrows();
    let labels = if t.shape() == y.shape() {
        t.rows().into_iter().map(argmax).collect()
    } else if t.len() == n && (t.ncols() == 1 || t.nrows() == 1) {
        to_indices(op, t.view())
    } else {
        fatal(NnError::shape(
            op,
            format!("{} or an index vector of length {}", fmt_shape(y.shape()), n),
            fmt_shape(t.shape()),
        ))
    };

    let classes = y.ncols();
    if let Some(&bad) = labels.iter().find(|&&c| c >= classes) {
        fatal(NnError::representation(
            op,
            format!("label {} is out of range for {} classes", bad, classes),
        ));
    }
    labels
}

/// Mean cross-entropy: `-Σ ln(y[i, t_i] + 1e-7) / N`.
pub fn cross_entropy_error(y: &Array2<f64>, t: &Array2<f64>) -> f64 {
    let labels = label_indices("cross_entropy_error", y, t);
    let n = y.nrows() as f64;
    let total: f64 = labels
        .iter()
        .enumerate()
        .map(|(i, &c)| (y[[i, c]] + LOG_EPS).ln())
        .sum();
    -total / n
}

// ============================================================================
// SoftmaxWithLoss
// ============================================================================

/// Softmax followed by cross-entropy.
///
/// Backward: `(y - onehot(t)) / N`.
#[derive(Debug, Clone, Default)]
pub struct SoftmaxWithLoss {
    y: Option<Array2<f64>>,
    labels: Option<Vec<usize>>,
}

impl SoftmaxWithLoss {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probabilities produced by the last forward pass.
    pub fn output(&self) -> Option<&Array2<f64>> {
        self.y.as_ref()
    }
}

impl LossLayer for SoftmaxWithLoss {
    fn forward(&mut self, x: &Array2<f64>, t: &Array2<f64>) -> f64 {
        let y = softmax(x);
        let labels = label_indices("SoftmaxWithLoss::forward", &y, t);
        let n = y.nrows() as f64;
        let loss = -labels
            .iter()
            .enumerate()
            .map(|(i, &c)| (y[[i, c]] + LOG_EPS).ln())
            .sum::<f64>()
            / n;

        self.y = Some(y);
        self.labels = Some(labels);
        loss
    }

    fn backward(&mut self) -> Array2<f64> {
        let y = cached("SoftmaxWithLoss::backward", &self.y);
        let labels = cached("SoftmaxWithLoss::backward", &self.labels);
        let n = y.nrows() as f64;

        let mut dx = y.clone();
        for (i, &c) in labels.iter().enumerate() {
            dx[[i, c]] -= 1.0;
        }
        dx / n
    }
}

// ============================================================================
// SigmoidWithLoss
// ============================================================================

/// Sigmoid followed by binary cross-entropy over `[1 - y, y]`.
///
/// Scores arrive as one value per sample, labels are 0 or 1.
/// Backward: `(y - t) / N`, shaped like the scores.
#[derive(Debug, Clone, Default)]
pub struct SigmoidWithLoss {
    y: Option<Array2<f64>>,
    t: Option<Array1<f64>>,
}

impl SigmoidWithLoss {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LossLayer for SigmoidWithLoss {
    fn forward(&mut self, x: &Array2<f64>, t: &Array2<f64>) -> f64 {
        let y = sigmoid(x);
        let n = y.len();

        let mut pair = Array2::zeros((n, 2));
        for (i, &p) in y.iter().enumerate() {
            pair[[i, 0]] = 1.0 - p;
            pair[[i, 1]] = p;
        }
        let labels = label_indices("SigmoidWithLoss::forward", &pair, t);
        let loss = cross_entropy_error(&pair, &ids_column(&labels));

        self.t = Some(labels.iter().map(|&c| c as f64).collect());
        self.y = Some(y);
        loss
    }

    fn backward(&mut self) -> Array2<f64> {
        let y = cached("SigmoidWithLoss::backward", &self.y);
        let t = cached("SigmoidWithLoss::backward", &self.t);
        let n = y.len() as f64;

        let mut dx = y.clone();
        for (d, &label) in dx.iter_mut().zip(t.iter()) {
            *d = (*d - label) / n;
        }
        dx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < tol, "{} vs {}", a, e);
        }
    }

    #[test]
    fn test_softmax_single_row() {
        let y = softmax(&array![[0.3, 2.9, 4.0]]);
        assert_close(
            y.as_slice().unwrap(),
            &[0.018211273295547, 0.24519181293507, 0.73659691376937],
            1e-9,
        );
    }

    #[test]
    fn test_softmax_batch_is_row_wise() {
        let y = softmax(&array![[1.0, 2.0, 3.0], [6.0, 5.0, 4.0], [7.0, 9.0, 8.0]]);
        let (a, b, c) = (0.09003057, 0.24472847, 0.66524096);
        assert_close(y.row(0).to_vec().as_slice(), &[a, b, c], 1e-7);
        assert_close(y.row(1).to_vec().as_slice(), &[c, b, a], 1e-7);
        assert_close(y.row(2).to_vec().as_slice(), &[a, c, b], 1e-7);
    }

    #[test]
    fn test_softmax_handles_large_values() {
        let y = softmax(&array![[1000.0, 1000.0]]);
        assert_close(y.as_slice().unwrap(), &[0.5, 0.5], 1e-12);
    }

    #[test]
    fn test_cross_entropy_one_hot() {
        let y = array![[0.1, 0.05, 0.6, 0.0, 0.05, 0.1, 0.0, 0.1, 0.0, 0.0]];
        let t = array![[0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]];
        assert!((cross_entropy_error(&y, &t) - 0.510825457).abs() < 1e-6);

        let y = array![[0.1, 0.05, 0.1, 0.0, 0.05, 0.1, 0.0, 0.6, 0.0, 0.0]];
        assert!((cross_entropy_error(&y, &t) - 2.302584).abs() < 1e-6);
    }

    #[test]
    fn test_cross_entropy_index_labels() {
        let y = array![[0.2, 0.8], [0.6, 0.4]];
        let expected = -((0.8f64 + LOG_EPS).ln() + (0.6f64 + LOG_EPS).ln()) / 2.0;
        assert!((cross_entropy_error(&y, &array![[1.0], [0.0]]) - expected).abs() < 1e-12);
        assert!((cross_entropy_error(&y, &array![[1.0, 0.0]]) - expected).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "shape mismatch")]
    fn test_cross_entropy_rejects_bad_label_shape() {
        let y = array![[0.2, 0.8], [0.6, 0.4]];
        cross_entropy_error(&y, &array![[1.0, 0.0, 1.0]]);
    }

    #[test]
    #[should_panic(expected = "invalid data representation")]
    fn test_cross_entropy_rejects_fractional_labels() {
        let y = array![[0.2, 0.8], [0.6, 0.4]];
        cross_entropy_error(&y, &array![[0.5], [1.0]]);
    }

    #[test]
    fn test_softmax_with_loss() {
        let mut layer = SoftmaxWithLoss::new();
        let loss = layer.forward(&array![[0.3, 2.9, 4.0]], &array![[0.0, 1.0, 0.0]]);
        assert!((loss - 1.405714056968575).abs() < 1e-6);

        let dx = layer.backward();
        assert_close(
            dx.as_slice().unwrap(),
            &[0.018211273295547, 0.24519181293507 - 1.0, 0.73659691376937],
            1e-9,
        );
    }

    #[test]
    fn test_softmax_with_loss_backward_averages_over_batch() {
        let mut layer = SoftmaxWithLoss::new();
        layer.forward(&array![[0.0, 0.0], [0.0, 0.0]], &array![[0.0], [1.0]]);
        let dx = layer.backward();
        assert_eq!(dx, array![[-0.25, 0.25], [0.25, -0.25]]);
    }

    #[test]
    fn test_sigmoid_with_loss() {
        let mut layer = SigmoidWithLoss::new();
        let x = array![[0.0], [1.0], [4.0], [0.0], [1.0]];
        let t = array![[0.0], [0.0], [1.0], [0.0], [0.0]];
        let loss = layer.forward(&x, &t);
        assert!((loss - 0.80619328371728).abs() < 1e-6);

        let dx = layer.backward();
        assert_eq!(dx.dim(), (5, 1));
        assert_close(
            dx.as_slice().unwrap(),
            &[0.1, 0.14621172, -0.00359724, 0.1, 0.14621172],
            1e-7,
        );
    }

    proptest! {
        #[test]
        fn prop_softmax_rows_sum_to_one(
            values in prop::collection::vec(-50.0f64..50.0, 12),
            cols in 1usize..5,
        ) {
            let rows = values.len() / cols;
            let x = Array2::from_shape_vec((rows, cols), values[..rows * cols].to_vec()).unwrap();
            let y = softmax(&x);
            for row in y.rows() {
                prop_assert!((row.sum() - 1.0).abs() < 1e-7);
                prop_assert!(row.iter().all(|&p| p >= 0.0));
            }
        }
    }
}
