//! Модуль с полносвязными слоями: `Affine`, `MatMul` и `TimeAffine`.
//!
//! Все три слоя реализуют формулу `y = xW (+ b)` и вручную выведенный
//! обратный проход:
//!
//! * `dW = xᵀ · dy`
//! * `db = Σ_rows dy`
//! * `dx = dy · Wᵀ`

use crate::error::ensure_shape;
use crate::nn::layer::{cached, Layer, Parameterized};
use crate::params::{Grad, Param, SharedMatrix};
use ndarray::{Array1, Array2, Array3, Axis};

/// Полносвязный слой `y = xW + b`.
#[derive(Debug, Clone)]
pub struct Affine {
    param: Param,
    grad: Grad,
    /// Вход последнего прямого прохода.
    x: Option<Array2<f64>>,
}

impl Affine {
    /// Создает слой из матрицы весов формы `[in, out]` и смещения длины `out`.
    ///
    /// Матрица передается как `SharedMatrix`. Общий вес допустим только у
    /// слоев без собственного смещения: `merge_shared` отклоняет группу, в
    /// которой у участников есть `bias`.
    pub fn new(weight: SharedMatrix, bias: Array1<f64>) -> Self {
        ensure_shape("Affine::new", &[weight.ncols()], &[bias.len()]);
        let param = Param::with_bias(weight, bias);
        let grad = Grad::zeros_like(&param);
        Self { param, grad, x: None }
    }

    pub fn weight(&self) -> &SharedMatrix {
        &self.param.weight
    }
}

impl Parameterized for Affine {
    fn param(&self) -> Option<Param> {
        Some(self.param.clone())
    }

    fn grad(&self) -> Option<Grad> {
        Some(self.grad.clone())
    }

    fn set_param(&mut self, param: Param) {
        self.param.check_replacement("Affine::set_param", &param);
        self.param = param;
    }
}

impl Layer for Affine {
    fn forward(&mut self, x: &Array2<f64>) -> Array2<f64> {
        let w = &self.param.weight;
        ensure_shape("Affine::forward", &[w.nrows()], &[x.ncols()]);
        let mut out = x.dot(&**w);
        if let Some(b) = &self.param.bias {
            out += b;
        }
        self.x = Some(x.clone());
        out
    }

    fn backward(&mut self, dout: &Array2<f64>) -> Array2<f64> {
        let x = cached("Affine::backward", &self.x);
        let w = &self.param.weight;
        ensure_shape("Affine::backward", &[x.nrows(), w.ncols()], dout.shape());

        let dx = dout.dot(&w.t());
        self.grad.weight = x.t().dot(dout);
        self.grad.bias = Some(dout.sum_axis(Axis(0)));
        dx
    }
}

/// Матричное умножение без смещения: `y = xW`.
#[derive(Debug, Clone)]
pub struct MatMul {
    param: Param,
    grad: Grad,
    x: Option<Array2<f64>>,
}

impl MatMul {
    pub fn new(weight: SharedMatrix) -> Self {
        let param = Param::new(weight);
        let grad = Grad::zeros_like(&param);
        Self { param, grad, x: None }
    }

    pub fn weight(&self) -> &SharedMatrix {
        &self.param.weight
    }
}

impl Parameterized for MatMul {
    fn param(&self) -> Option<Param> {
        Some(self.param.clone())
    }

    fn grad(&self) -> Option<Grad> {
        Some(self.grad.clone())
    }

    fn set_param(&mut self, param: Param) {
        self.param.check_replacement("MatMul::set_param", &param);
        self.param = param;
    }
}

impl Layer for MatMul {
    fn forward(&mut self, x: &Array2<f64>) -> Array2<f64> {
        let w = &self.param.weight;
        ensure_shape("MatMul::forward", &[w.nrows()], &[x.ncols()]);
        self.x = Some(x.clone());
        x.dot(&**w)
    }

    fn backward(&mut self, dout: &Array2<f64>) -> Array2<f64> {
        let x = cached("MatMul::backward", &self.x);
        let w = &self.param.weight;
        ensure_shape("MatMul::backward", &[x.nrows(), w.ncols()], dout.shape());

        let dx = dout.dot(&w.t());
        self.grad.weight = x.t().dot(dout);
        dx
    }
}

/// Сворачивает батч последовательностей `(N, T, D)` в матрицу `(N*T, D)`.
pub(crate) fn fold_time(xs: &Array3<f64>) -> Array2<f64> {
    let (n, t, d) = xs.dim();
    Array2::from_shape_fn((n * t, d), |(r, c)| xs[[r / t, r % t, c]])
}

/// Обратная операция к [`fold_time`].
pub(crate) fn unfold_time(x: &Array2<f64>, n: usize, t: usize) -> Array3<f64> {
    ensure_shape("unfold_time", &[n * t], &[x.nrows()]);
    let d = x.ncols();
    Array3::from_shape_fn((n, t, d), |(i, j, c)| x[[i * t + j, c]])
}

/// Полносвязный слой, применяемый к каждому шагу последовательности.
///
/// Вход имеет форму `(N, T, D)`, выход `(N, T, H)`. Градиенты весов
/// суммируются по всем шагам.
#[derive(Debug, Clone)]
pub struct TimeAffine {
    inner: Affine,
    dims: Option<(usize, usize)>,
}

impl TimeAffine {
    pub fn new(weight: SharedMatrix, bias: Array1<f64>) -> Self {
        Self {
            inner: Affine::new(weight, bias),
            dims: None,
        }
    }

    pub fn forward(&mut self, xs: &Array3<f64>) -> Array3<f64> {
        let (n, t, _) = xs.dim();
        self.dims = Some((n, t));
        let out = self.inner.forward(&fold_time(xs));
        unfold_time(&out, n, t)
    }

    pub fn backward(&mut self, dout: &Array3<f64>) -> Array3<f64> {
        let (n, t) = *cached("TimeAffine::backward", &self.dims);
        ensure_shape("TimeAffine::backward", &[n, t], &dout.shape()[..2]);
        let dx = self.inner.backward(&fold_time(dout));
        unfold_time(&dx, n, t)
    }
}

impl Parameterized for TimeAffine {
    fn param(&self) -> Option<Param> {
        self.inner.param()
    }

    fn grad(&self) -> Option<Grad> {
        self.inner.grad()
    }

    fn set_param(&mut self, param: Param) {
        self.inner.set_param(param);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::shared;
    use ndarray::array;

    #[test]
    fn test_affine_forward() {
        let mut layer = Affine::new(shared(array![[1.0, 2.0], [3.0, 4.0]]), array![1.0, 1.0]);
        let y = layer.forward(&array![[1.0, 1.0], [1.0, 1.0]]);
        assert_eq!(y, array![[5.0, 7.0], [5.0, 7.0]]);
    }

    #[test]
    fn test_affine_backward() {
        let mut layer = Affine::new(shared(array![[1.0, 2.0], [3.0, 4.0]]), array![1.0, 1.0]);
        layer.forward(&array![[1.0, 2.0], [3.0, 4.0]]);
        let dx = layer.backward(&array![[1.0, 2.0], [3.0, 4.0]]);

        assert_eq!(dx, array![[5.0, 11.0], [11.0, 25.0]]);
        let g = layer.grad().unwrap();
        assert_eq!(g.weight, array![[10.0, 14.0], [14.0, 20.0]]);
        assert_eq!(g.bias.unwrap(), array![4.0, 6.0]);
    }

    #[test]
    #[should_panic(expected = "backward called before forward")]
    fn test_affine_backward_without_forward() {
        let mut layer = Affine::new(shared(array![[1.0]]), array![0.0]);
        layer.backward(&array![[1.0]]);
    }

    #[test]
    #[should_panic(expected = "shape mismatch")]
    fn test_affine_rejects_wrong_input_width() {
        let mut layer = Affine::new(shared(array![[1.0, 2.0], [3.0, 4.0]]), array![1.0, 1.0]);
        layer.forward(&array![[1.0, 1.0, 1.0]]);
    }

    #[test]
    fn test_matmul_has_no_bias() {
        let mut layer = MatMul::new(shared(array![[1.0, 2.0], [3.0, 4.0]]));
        let y = layer.forward(&array![[1.0, 0.0]]);
        assert_eq!(y, array![[1.0, 2.0]]);
        layer.backward(&array![[1.0, 1.0]]);
        let g = layer.grad().unwrap();
        assert!(g.bias.is_none());
        assert_eq!(g.weight, array![[1.0, 1.0], [0.0, 0.0]]);
    }

    #[test]
    fn test_time_affine_matches_per_step_affine() {
        let w = shared(array![[1.0, -1.0], [0.5, 2.0]]);
        let b = array![0.1, 0.2];
        let xs = Array3::from_shape_fn((2, 3, 2), |(i, j, k)| (i * 6 + j * 2 + k) as f64 * 0.1);

        let mut time_layer = TimeAffine::new(w.clone(), b.clone());
        let ys = time_layer.forward(&xs);
        assert_eq!(ys.dim(), (2, 3, 2));

        let mut step_layer = Affine::new(w, b);
        for j in 0..3 {
            let step = xs.index_axis(Axis(1), j).to_owned();
            let expected = step_layer.forward(&step);
            let actual = ys.index_axis(Axis(1), j);
            for (a, e) in actual.iter().zip(expected.iter()) {
                assert!((a - e).abs() < 1e-12);
            }
        }

        let dout = Array3::ones((2, 3, 2));
        let dxs = time_layer.backward(&dout);
        assert_eq!(dxs.dim(), (2, 3, 2));
        // Bias gradient sums over batch and time.
        assert_eq!(time_layer.grad().unwrap().bias.unwrap(), array![6.0, 6.0]);
    }
}
