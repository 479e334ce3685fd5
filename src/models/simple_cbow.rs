//! CBOW with a full softmax over the vocabulary.
//!
//! Context IDs are one-hot encoded and projected by [`MatMul`] layers that
//! all alias `W_in`. Suitable for tiny vocabularies only: the output layer
//! scores every word.

use super::{ensure_positive, init_weight, Model};
use crate::data::corpus::one_hot;
use crate::error::{ensure_shape, Result};
use crate::losses::SoftmaxWithLoss;
use crate::nn::layer::ensure_param_count;
use crate::nn::{Layer, LossLayer, MatMul, ParamSet, Parameterized};
use crate::params::{shared, to_indices, Grad, Param, SharedMatrix};
use ndarray::{Array2, Axis};
use rand::Rng;
use std::sync::Arc;

pub struct SimpleCbow {
    vocab_size: usize,
    in_layers: Vec<MatMul>,
    out_layer: MatMul,
    loss_layer: SoftmaxWithLoss,
}

impl SimpleCbow {
    pub fn new<R: Rng>(vocab_size: usize, hidden_size: usize, window_size: usize, rng: &mut R) -> Result<Self> {
        ensure_positive("vocabulary size", vocab_size)?;
        ensure_positive("hidden size", hidden_size)?;
        ensure_positive("window size", window_size)?;

        let w_in = shared(init_weight(vocab_size, hidden_size, rng)?);
        let w_out = shared(init_weight(hidden_size, vocab_size, rng)?);
        let in_layers = (0..2 * window_size)
            .map(|_| MatMul::new(Arc::clone(&w_in)))
            .collect();

        Ok(Self {
            vocab_size,
            in_layers,
            out_layer: MatMul::new(w_out),
            loss_layer: SoftmaxWithLoss::new(),
        })
    }

    /// The learned word vectors (`W_in`), one row per word.
    pub fn word_vecs(&self) -> SharedMatrix {
        Arc::clone(self.in_layers[0].weight())
    }
}

impl ParamSet for SimpleCbow {
    /// Every context projection (all aliasing `W_in`), then `W_out`.
    fn params(&self) -> Vec<Param> {
        self.in_layers
            .iter()
            .filter_map(|l| l.param())
            .chain(self.out_layer.param())
            .collect()
    }

    fn grads(&self) -> Vec<Grad> {
        self.in_layers
            .iter()
            .filter_map(|l| l.grad())
            .chain(self.out_layer.grad())
            .collect()
    }

    fn update_params(&mut self, mut params: Vec<Param>) {
        ensure_param_count("SimpleCbow::update_params", self.in_layers.len() + 1, params.len());
        let out = params.split_off(self.in_layers.len());
        for (layer, param) in self.in_layers.iter_mut().zip(params) {
            layer.set_param(param);
        }
        for param in out {
            self.out_layer.set_param(param);
        }
    }
}

impl Model for SimpleCbow {
    fn forward(&mut self, x: &Array2<f64>, t: &Array2<f64>) -> f64 {
        let slots = self.in_layers.len();
        ensure_shape("SimpleCbow::forward", &[x.nrows(), slots], x.shape());

        let hidden = self.out_layer.weight().nrows();
        let mut h = Array2::<f64>::zeros((x.nrows(), hidden));
        for (layer, column) in self.in_layers.iter_mut().zip(x.axis_iter(Axis(1))) {
            let ids = to_indices("SimpleCbow::forward", column.insert_axis(Axis(1)));
            h += &layer.forward(&one_hot(&ids, self.vocab_size));
        }
        h /= slots as f64;

        let score = self.out_layer.forward(&h);
        self.loss_layer.forward(&score, t)
    }

    fn backward(&mut self) {
        let ds = self.loss_layer.backward();
        let mut da = self.out_layer.backward(&ds);
        da /= self.in_layers.len() as f64;
        for layer in self.in_layers.iter_mut() {
            layer.backward(&da);
        }
    }
}
