//! Negative-sampling loss: a cheap stand-in for a full-vocabulary softmax.
//!
//! The true target is scored with label 1 and `sample_size` words drawn
//! from a [`NegativeSampler`] are scored with label 0. Every scorer is an
//! [`EmbeddingDot`] over one shared output embedding.

use crate::data::unigram::NegativeSampler;
use crate::error::{ensure_shape, fatal, NnError};
use crate::losses::SigmoidWithLoss;
use crate::nn::embedding::EmbeddingDot;
use crate::nn::layer::{ensure_param_count, LossLayer, ParamSet, Parameterized};
use crate::params::{Grad, Param, SharedMatrix};
use ndarray::{Array2, Axis};
use std::sync::Arc;

pub struct NegativeSamplingLoss {
    sampler: Box<dyn NegativeSampler>,
    embed_dots: Vec<EmbeddingDot>,
    losses: Vec<SigmoidWithLoss>,
}

impl NegativeSamplingLoss {
    /// `weight` is the output embedding (`vocab x hidden`); all
    /// `sample_size + 1` scorers alias it.
    pub fn new(weight: SharedMatrix, sampler: Box<dyn NegativeSampler>) -> Self {
        let pairs = sampler.sample_size() + 1;
        let embed_dots = (0..pairs)
            .map(|_| EmbeddingDot::new(Arc::clone(&weight)))
            .collect();
        let losses = (0..pairs).map(|_| SigmoidWithLoss::new()).collect();
        Self {
            sampler,
            embed_dots,
            losses,
        }
    }

    pub fn sample_size(&self) -> usize {
        self.embed_dots.len() - 1
    }

    /// Sum of the positive and negative binary losses for the batch.
    pub fn forward(&mut self, h: &Array2<f64>, target: &[usize]) -> f64 {
        let n = h.nrows();
        ensure_shape("NegativeSamplingLoss::forward", &[n], &[target.len()]);
        let negatives = self.sampler.negative_sample(target);

        let positive = Array2::ones((n, 1));
        let score = self.embed_dots[0].forward(h, target);
        let mut loss = self.losses[0].forward(&score, &positive);

        let negative = Array2::zeros((n, 1));
        for (i, column) in negatives.axis_iter(Axis(1)).enumerate() {
            let ids = column.to_vec();
            let score = self.embed_dots[i + 1].forward(h, &ids);
            loss += self.losses[i + 1].forward(&score, &negative);
        }
        loss
    }

    /// Gradient of the summed loss w.r.t. `h`.
    pub fn backward(&mut self) -> Array2<f64> {
        let mut dh: Option<Array2<f64>> = None;
        for (loss, dot) in self.losses.iter_mut().zip(self.embed_dots.iter_mut()) {
            let dscore = loss.backward();
            let d = dot.backward(&dscore);
            match dh.as_mut() {
                Some(acc) => *acc += &d,
                None => dh = Some(d),
            }
        }
        match dh {
            Some(dh) => dh,
            None => fatal(NnError::representation(
                "NegativeSamplingLoss::backward",
                "layer has no scorers",
            )),
        }
    }
}

impl ParamSet for NegativeSamplingLoss {
    fn params(&self) -> Vec<Param> {
        self.embed_dots.iter().filter_map(|e| e.param()).collect()
    }

    fn grads(&self) -> Vec<Grad> {
        self.embed_dots.iter().filter_map(|e| e.grad()).collect()
    }

    fn update_params(&mut self, params: Vec<Param>) {
        let mut slots: Vec<&mut EmbeddingDot> = self
            .embed_dots
            .iter_mut()
            .filter(|e| e.param().is_some())
            .collect();
        ensure_param_count("NegativeSamplingLoss::update_params", slots.len(), params.len());
        for (slot, param) in slots.iter_mut().zip(params) {
            slot.set_param(param);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::unigram::{UniformSource, UnigramSampler};
    use crate::params::shared;
    use ndarray::array;

    struct FixedFraction(f64);

    impl UniformSource for FixedFraction {
        fn next_below(&mut self, upper: f64) -> f64 {
            self.0 * upper
        }
    }

    fn layer() -> NegativeSamplingLoss {
        let corpus = [0, 1, 2, 3, 4, 1, 2, 3];
        let sampler = UnigramSampler::new(&corpus, 0.75, 2, FixedFraction(0.3)).unwrap();
        let w = Array2::from_shape_fn((5, 3), |(i, j)| 0.1 * (i as f64) - 0.05 * (j as f64));
        NegativeSamplingLoss::new(shared(w), Box::new(sampler))
    }

    #[test]
    fn test_all_scorers_alias_one_weight() {
        let nsl = layer();
        let params = nsl.params();
        assert_eq!(params.len(), 3);
        assert!(params[0].shares_weight(&params[1]));
        assert!(params[0].shares_weight(&params[2]));
    }

    #[test]
    fn test_forward_sums_positive_and_negative_losses() {
        let mut nsl = layer();
        let h = array![[0.2, -0.1, 0.4], [0.0, 0.3, -0.2]];
        let target = [1, 0];
        let loss = nsl.forward(&h, &target);

        // Same draws as the sampler would make: targets 1 and 0 -> [2, 3] and [2, 1].
        let w = nsl.params()[0].weight.clone();
        let score = |row: usize, word: usize| -> f64 {
            (0..3).map(|k| w[[word, k]] * h[[row, k]]).sum()
        };
        let sig = |x: f64| 1.0 / (1.0 + (-x).exp());
        let eps = crate::losses::LOG_EPS;
        let pos = -((sig(score(0, 1)) + eps).ln() + (sig(score(1, 0)) + eps).ln()) / 2.0;
        let neg = |a: usize, b: usize| {
            -((1.0 - sig(score(0, a)) + eps).ln() + (1.0 - sig(score(1, b)) + eps).ln()) / 2.0
        };
        let expected = pos + neg(2, 2) + neg(3, 1);
        assert!((loss - expected).abs() < 1e-12, "{} vs {}", loss, expected);
    }

    #[test]
    fn test_backward_returns_hidden_gradient() {
        let mut nsl = layer();
        let h = array![[0.2, -0.1, 0.4], [0.0, 0.3, -0.2]];
        nsl.forward(&h, &[1, 0]);
        let dh = nsl.backward();
        assert_eq!(dh.dim(), (2, 3));
        assert_eq!(nsl.grads().len(), 3);
    }

    #[test]
    fn test_update_params_replaces_every_scorer() {
        let mut nsl = layer();
        let fresh = shared(Array2::zeros((5, 3)));
        nsl.update_params(vec![Param::new(fresh.clone()); 3]);
        for p in nsl.params() {
            assert!(Arc::ptr_eq(&p.weight, &fresh));
        }
    }

    #[test]
    #[should_panic(expected = "shape mismatch")]
    fn test_update_params_requires_one_entry_per_scorer() {
        let mut nsl = layer();
        nsl.update_params(vec![Param::new(shared(Array2::zeros((5, 3))))]);
    }
}
