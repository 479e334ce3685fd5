//! Two-layer feed-forward classifier.
//!
//! `Affine -> activation -> Affine -> SoftmaxWithLoss`. No parameter is
//! shared between layers.

use super::{ensure_positive, init_weight, Model};
use crate::error::Result;
use crate::losses::{argmax, label_indices, SoftmaxWithLoss};
use crate::nn::layer::ensure_param_count;
use crate::nn::{Affine, Layer, LossLayer, ParamSet, ReLU, Sigmoid};
use crate::params::{shared, Grad, Param};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Hidden-layer nonlinearity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Sigmoid,
    Relu,
}

pub struct TwoLayerNet {
    layers: Vec<Box<dyn Layer>>,
    loss_layer: SoftmaxWithLoss,
}

impl TwoLayerNet {
    pub fn new<R: Rng>(
        input_size: usize,
        hidden_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        ensure_positive("input size", input_size)?;
        ensure_positive("hidden size", hidden_size)?;
        ensure_positive("output size", output_size)?;

        let w1 = shared(init_weight(input_size, hidden_size, rng)?);
        let w2 = shared(init_weight(hidden_size, output_size, rng)?);
        let hidden: Box<dyn Layer> = Box::new(Affine::new(w1, Array1::zeros(hidden_size)));
        let act: Box<dyn Layer> = match activation {
            Activation::Sigmoid => Box::new(Sigmoid::new()),
            Activation::Relu => Box::new(ReLU::new()),
        };
        let output: Box<dyn Layer> = Box::new(Affine::new(w2, Array1::zeros(output_size)));

        Ok(Self {
            layers: vec![hidden, act, output],
            loss_layer: SoftmaxWithLoss::new(),
        })
    }

    /// Class scores (before softmax) for a batch.
    pub fn predict(&mut self, x: &Array2<f64>) -> Array2<f64> {
        self.layers
            .iter_mut()
            .fold(x.clone(), |out, layer| layer.forward(&out))
    }

    /// Fraction of rows whose highest score matches the label.
    ///
    /// `t` holds either one-hot rows or one class index per row.
    pub fn accuracy(&mut self, x: &Array2<f64>, t: &Array2<f64>) -> f64 {
        let scores = self.predict(x);
        let labels = label_indices("TwoLayerNet::accuracy", &scores, t);
        let hits = scores
            .axis_iter(Axis(0))
            .zip(&labels)
            .filter(|(row, label)| argmax(row.view()) == **label)
            .count();
        hits as f64 / scores.nrows() as f64
    }
}

impl ParamSet for TwoLayerNet {
    fn params(&self) -> Vec<Param> {
        self.layers.iter().filter_map(|l| l.param()).collect()
    }

    fn grads(&self) -> Vec<Grad> {
        self.layers.iter().filter_map(|l| l.grad()).collect()
    }

    fn update_params(&mut self, params: Vec<Param>) {
        let mut slots: Vec<&mut Box<dyn Layer>> = self
            .layers
            .iter_mut()
            .filter(|l| l.param().is_some())
            .collect();
        ensure_param_count("TwoLayerNet::update_params", slots.len(), params.len());
        for (layer, param) in slots.iter_mut().zip(params) {
            layer.set_param(param);
        }
    }
}

impl Model for TwoLayerNet {
    fn forward(&mut self, x: &Array2<f64>, t: &Array2<f64>) -> f64 {
        let score = self.predict(x);
        self.loss_layer.forward(&score, t)
    }

    fn backward(&mut self) {
        let mut dout = self.loss_layer.backward();
        for layer in self.layers.iter_mut().rev() {
            dout = layer.backward(&dout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parameter_layout() {
        let mut rng = StdRng::seed_from_u64(3);
        let net = TwoLayerNet::new(4, 6, 3, Activation::Relu, &mut rng).unwrap();
        let params = net.params();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].weight.dim(), (4, 6));
        assert_eq!(params[1].bias.as_ref().unwrap().len(), 3);
        assert!(!params[0].shares_weight(&params[1]));
    }

    #[test]
    fn test_forward_backward() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut net = TwoLayerNet::new(2, 4, 2, Activation::Sigmoid, &mut rng).unwrap();
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let t = array![[0.0], [1.0], [1.0]];

        let loss = net.forward(&x, &t);
        assert!((loss - 2f64.ln()).abs() < 5e-2);

        net.backward();
        let grads = net.grads();
        assert_eq!(grads.len(), 2);
        assert_eq!(grads[0].weight.dim(), (2, 4));
        assert_eq!(grads[1].bias.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_accuracy_counts_argmax_hits() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut net = TwoLayerNet::new(2, 2, 2, Activation::Relu, &mut rng).unwrap();
        let mut params = net.params();
        // Identity network: the larger input wins.
        params[0] = Param::with_bias(shared(array![[1.0, 0.0], [0.0, 1.0]]), array![0.0, 0.0]);
        params[1] = Param::with_bias(shared(array![[1.0, 0.0], [0.0, 1.0]]), array![0.0, 0.0]);
        net.update_params(params);

        let x = array![[2.0, 1.0], [0.0, 3.0], [5.0, 1.0]];
        assert_eq!(net.accuracy(&x, &array![[0.0], [1.0], [1.0]]), 2.0 / 3.0);
    }
}
