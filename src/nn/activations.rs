//! Модуль со слоями-активациями: `Sigmoid`, `ReLU`, `Softmax`.
//!
//! Слои не имеют обучаемых параметров и кэшируют свой выход
//! для обратного прохода.

use crate::error::ensure_shape;
use crate::losses::{sigmoid, softmax};
use crate::nn::layer::{cached, Layer, Parameterized};
use ndarray::{Array2, Axis, Zip};

// --- Слой Sigmoid ---

/// Логистическая функция `1 / (1 + e^-x)`.
///
/// Обратный проход: `dx = dout * (1 - y) * y`.
#[derive(Debug, Clone, Default)]
pub struct Sigmoid {
    out: Option<Array2<f64>>,
}

impl Sigmoid {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Parameterized for Sigmoid {}

impl Layer for Sigmoid {
    fn forward(&mut self, x: &Array2<f64>) -> Array2<f64> {
        let y = sigmoid(x);
        self.out = Some(y.clone());
        y
    }

    fn backward(&mut self, dout: &Array2<f64>) -> Array2<f64> {
        let y = cached("Sigmoid::backward", &self.out);
        ensure_shape("Sigmoid::backward", y.shape(), dout.shape());
        Zip::from(dout).and(y).map_collect(|&d, &y| d * (1.0 - y) * y)
    }
}

// --- Слой ReLU ---

/// Слой активации ReLU: `max(0, x)`.
///
/// Кэширует выход; в обратном проходе градиент обнуляется там,
/// где выход равен нулю.
#[derive(Debug, Clone, Default)]
pub struct ReLU {
    out: Option<Array2<f64>>,
}

impl ReLU {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Parameterized for ReLU {}

impl Layer for ReLU {
    fn forward(&mut self, x: &Array2<f64>) -> Array2<f64> {
        let y = x.mapv(|v| v.max(0.0));
        self.out = Some(y.clone());
        y
    }

    fn backward(&mut self, dout: &Array2<f64>) -> Array2<f64> {
        let y = cached("ReLU::backward", &self.out);
        ensure_shape("ReLU::backward", y.shape(), dout.shape());
        Zip::from(dout)
            .and(y)
            .map_collect(|&d, &y| if y == 0.0 { 0.0 } else { d })
    }
}

// --- Слой Softmax ---

/// Построчный softmax как самостоятельный слой.
///
/// Обратный проход: `dx = y * (dout - Σ_row(dout * y))`.
#[derive(Debug, Clone, Default)]
pub struct Softmax {
    out: Option<Array2<f64>>,
}

impl Softmax {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Parameterized for Softmax {}

impl Layer for Softmax {
    fn forward(&mut self, x: &Array2<f64>) -> Array2<f64> {
        let y = softmax(x);
        self.out = Some(y.clone());
        y
    }

    fn backward(&mut self, dout: &Array2<f64>) -> Array2<f64> {
        let y = cached("Softmax::backward", &self.out);
        ensure_shape("Softmax::backward", y.shape(), dout.shape());
        let weighted = dout * y;
        let row_sum = weighted.sum_axis(Axis(1)).insert_axis(Axis(1));
        &weighted - &(y * &row_sum)
    }
}
