//! Continuous bag-of-words with negative sampling.
//!
//! Every context slot is an [`Embedding`] over the same input matrix
//! `W_in`. Their outputs are averaged into `h`, which the
//! [`NegativeSamplingLoss`] scores against the output matrix `W_out`.

use super::{ensure_positive, init_weight, Model};
use crate::data::unigram::{NegativeSampler, UnigramSampler};
use crate::error::{ensure_shape, NnError, Result};
use crate::nn::layer::ensure_param_count;
use crate::nn::{Embedding, NegativeSamplingLoss, ParamSet, Parameterized};
use crate::params::{shared, to_indices, Grad, Param, SharedMatrix};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Negative examples drawn per target when none is configured.
pub const DEFAULT_SAMPLE_SIZE: usize = 5;
/// Smoothing exponent of the unigram distribution.
pub const DEFAULT_POWER: f64 = 0.75;

pub struct Cbow {
    in_layers: Vec<Embedding>,
    ns_loss: NegativeSamplingLoss,
}

impl Cbow {
    /// Creates a model with randomly initialised weights and a unigram
    /// sampler built from `corpus`.
    pub fn new<R: Rng>(
        vocab_size: usize,
        hidden_size: usize,
        window_size: usize,
        corpus: &[usize],
        rng: &mut R,
    ) -> Result<Self> {
        Self::with_sampling(
            vocab_size,
            hidden_size,
            window_size,
            corpus,
            DEFAULT_SAMPLE_SIZE,
            DEFAULT_POWER,
            rng,
        )
    }

    /// Like [`Cbow::new`] with an explicit sample size and smoothing power.
    pub fn with_sampling<R: Rng>(
        vocab_size: usize,
        hidden_size: usize,
        window_size: usize,
        corpus: &[usize],
        sample_size: usize,
        power: f64,
        rng: &mut R,
    ) -> Result<Self> {
        ensure_positive("vocabulary size", vocab_size)?;
        ensure_positive("hidden size", hidden_size)?;
        if let Some(&max) = corpus.iter().max() {
            if max >= vocab_size {
                return Err(NnError::InvalidConfig(format!(
                    "corpus contains id {} but the vocabulary has {} words",
                    max, vocab_size
                )));
            }
        }

        let w_in = shared(init_weight(vocab_size, hidden_size, rng)?);
        let w_out = shared(init_weight(vocab_size, hidden_size, rng)?);
        let sampler = UnigramSampler::new(corpus, power, sample_size, StdRng::from_rng(rng))?;
        Self::from_parts(w_in, w_out, window_size, Box::new(sampler))
    }

    /// Assembles a model from explicit weights and a sampler.
    pub fn from_parts(
        w_in: SharedMatrix,
        w_out: SharedMatrix,
        window_size: usize,
        sampler: Box<dyn NegativeSampler>,
    ) -> Result<Self> {
        ensure_positive("window size", window_size)?;
        if w_in.ncols() != w_out.ncols() {
            return Err(NnError::InvalidConfig(format!(
                "input embedding width {} differs from output embedding width {}",
                w_in.ncols(),
                w_out.ncols()
            )));
        }

        let in_layers = (0..2 * window_size)
            .map(|_| Embedding::new(Arc::clone(&w_in)))
            .collect();
        Ok(Self {
            in_layers,
            ns_loss: NegativeSamplingLoss::new(w_out, sampler),
        })
    }

    /// The learned word vectors, one row per word.
    pub fn word_vecs(&self) -> SharedMatrix {
        Arc::clone(self.in_layers[0].weight())
    }

    fn slots(&self) -> usize {
        self.in_layers.len()
    }
}

impl ParamSet for Cbow {
    /// `W_in` once, followed by the entries of the loss layer.
    fn params(&self) -> Vec<Param> {
        let mut params: Vec<Param> = self.in_layers[0].param().into_iter().collect();
        params.extend(self.ns_loss.params());
        params
    }

    /// The `W_in` gradient is the sum over all context slots.
    fn grads(&self) -> Vec<Grad> {
        let mut grads = Vec::with_capacity(1 + self.ns_loss.sample_size() + 1);
        let mut slot_grads = self.in_layers.iter().filter_map(|l| l.grad());
        if let Some(mut total) = slot_grads.next() {
            slot_grads.for_each(|g| total.accumulate(&g));
            grads.push(total);
        }
        grads.extend(self.ns_loss.grads());
        grads
    }

    fn update_params(&mut self, mut params: Vec<Param>) {
        let loss_slots = self.ns_loss.params().len();
        ensure_param_count("Cbow::update_params", 1 + loss_slots, params.len());

        let loss_params = params.split_off(1);
        let w_in = params.swap_remove(0);
        for layer in self.in_layers.iter_mut() {
            layer.set_param(w_in.clone());
        }
        self.ns_loss.update_params(loss_params);
    }
}

impl Model for Cbow {
    /// `x` holds context IDs `(N, 2 * window)`, `t` the target IDs.
    fn forward(&mut self, x: &Array2<f64>, t: &Array2<f64>) -> f64 {
        let slots = self.slots();
        ensure_shape("Cbow::forward", &[x.nrows(), slots], x.shape());
        let target = to_indices("Cbow::forward", t.view());
        ensure_shape("Cbow::forward", &[x.nrows()], &[target.len()]);

        let mut h = Array2::<f64>::zeros((x.nrows(), self.in_layers[0].dim()));
        for (layer, column) in self.in_layers.iter_mut().zip(x.axis_iter(Axis(1))) {
            let ids = to_indices("Cbow::forward", column.insert_axis(Axis(1)));
            h += &layer.lookup(&ids);
        }
        h /= slots as f64;

        self.ns_loss.forward(&h, &target)
    }

    fn backward(&mut self) {
        let mut dh = self.ns_loss.backward();
        dh /= self.slots() as f64;
        for layer in self.in_layers.iter_mut() {
            layer.scatter(&dh);
        }
    }
}
