//! Recurrent layers: a single tanh cell and its unrolled time version.
//!
//! Parameter layout: `weight` is the input projection `Wx` (`D x H`),
//! `weight_h` the recurrent projection `Wh` (`H x H`), `bias` has length `H`.

use crate::error::{ensure_shape, fatal, NnError};
use crate::nn::layer::{cached, Parameterized};
use crate::params::{Grad, Param, SharedMatrix};
use ndarray::{Array1, Array2, Array3, Axis};

fn recurrent_parts<'a>(op: &'static str, param: &'a Param) -> (&'a Array2<f64>, &'a Array1<f64>) {
    match (&param.weight_h, &param.bias) {
        (Some(wh), Some(b)) => (wh, b),
        _ => fatal(NnError::representation(op, "recurrent weight or bias is missing")),
    }
}

fn recurrent_param(wx: SharedMatrix, wh: Array2<f64>, b: Array1<f64>) -> Param {
    let h = wx.ncols();
    ensure_shape("Rnn::new", &[h, h], wh.shape());
    ensure_shape("Rnn::new", &[h], &[b.len()]);
    Param {
        weight: wx,
        weight_h: Some(wh),
        bias: Some(b),
    }
}

/// One step of a vanilla RNN: `h' = tanh(h·Wh + x·Wx + b)`.
#[derive(Debug, Clone)]
pub struct Rnn {
    param: Param,
    grad: Grad,
    /// `(x, h_prev, h_next)` of the last forward pass.
    cache: Option<(Array2<f64>, Array2<f64>, Array2<f64>)>,
}

impl Rnn {
    pub fn new(wx: SharedMatrix, wh: Array2<f64>, b: Array1<f64>) -> Self {
        Self::from_param(recurrent_param(wx, wh, b))
    }

    fn from_param(param: Param) -> Self {
        let grad = Grad::zeros_like(&param);
        Self {
            param,
            grad,
            cache: None,
        }
    }

    pub fn forward(&mut self, x: &Array2<f64>, h_prev: &Array2<f64>) -> Array2<f64> {
        let (wh, b) = recurrent_parts("Rnn::forward", &self.param);
        let wx = &self.param.weight;
        ensure_shape("Rnn::forward", &[wx.nrows()], &[x.ncols()]);
        ensure_shape("Rnn::forward", &[x.nrows(), wh.nrows()], h_prev.shape());

        let mut t = h_prev.dot(wh) + x.dot(&**wx);
        t += b;
        let h_next = t.mapv(f64::tanh);

        self.cache = Some((x.clone(), h_prev.clone(), h_next.clone()));
        h_next
    }

    /// Returns `(dx, dh_prev)`.
    pub fn backward(&mut self, dh_next: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let (x, h_prev, h_next) = cached("Rnn::backward", &self.cache);
        ensure_shape("Rnn::backward", h_next.shape(), dh_next.shape());
        let (wh, _) = recurrent_parts("Rnn::backward", &self.param);
        let wx = &self.param.weight;

        let dt = dh_next * &h_next.mapv(|h| 1.0 - h * h);
        let dh_prev = dt.dot(&wh.t());
        let dx = dt.dot(&wx.t());

        self.grad = Grad {
            weight: x.t().dot(&dt),
            weight_h: Some(h_prev.t().dot(&dt)),
            bias: Some(dt.sum_axis(Axis(0))),
        };
        (dx, dh_prev)
    }
}

impl Parameterized for Rnn {
    fn param(&self) -> Option<Param> {
        Some(self.param.clone())
    }

    fn grad(&self) -> Option<Grad> {
        Some(self.grad.clone())
    }

    fn set_param(&mut self, param: Param) {
        self.param.check_replacement("Rnn::set_param", &param);
        self.param = param;
    }
}

/// An RNN unrolled over `T` steps of a `(N, T, D)` batch.
///
/// When `stateful`, the final hidden state of one call seeds the next call
/// until [`TimeRnn::reset_state`]. Otherwise every call starts from zeros.
#[derive(Debug, Clone)]
pub struct TimeRnn {
    param: Param,
    grad: Grad,
    cells: Vec<Rnn>,
    h: Option<Array2<f64>>,
    dh: Option<Array2<f64>>,
    stateful: bool,
}

impl TimeRnn {
    pub fn new(wx: SharedMatrix, wh: Array2<f64>, b: Array1<f64>, stateful: bool) -> Self {
        let param = recurrent_param(wx, wh, b);
        let grad = Grad::zeros_like(&param);
        Self {
            param,
            grad,
            cells: Vec::new(),
            h: None,
            dh: None,
            stateful,
        }
    }

    pub fn set_state(&mut self, h: Array2<f64>) {
        ensure_shape("TimeRnn::set_state", &[self.param.weight.ncols()], &[h.ncols()]);
        self.h = Some(h);
    }

    pub fn reset_state(&mut self) {
        self.h = None;
    }

    /// Hidden state after the last forward pass.
    pub fn state(&self) -> Option<&Array2<f64>> {
        self.h.as_ref()
    }

    /// Gradient w.r.t. the initial hidden state of the last backward pass.
    pub fn dh(&self) -> Option<&Array2<f64>> {
        self.dh.as_ref()
    }

    pub fn forward(&mut self, xs: &Array3<f64>) -> Array3<f64> {
        let (n, t, _) = xs.dim();
        let hidden = self.param.weight.ncols();

        let mut h = match (&self.h, self.stateful) {
            (Some(h), true) => {
                ensure_shape("TimeRnn::forward", &[n, hidden], h.shape());
                h.clone()
            }
            _ => Array2::zeros((n, hidden)),
        };

        let mut hs = Array3::zeros((n, t, hidden));
        self.cells.clear();
        for step in 0..t {
            let mut cell = Rnn::from_param(self.param.clone());
            h = cell.forward(&xs.index_axis(Axis(1), step).to_owned(), &h);
            hs.index_axis_mut(Axis(1), step).assign(&h);
            self.cells.push(cell);
        }
        self.h = Some(h);
        hs
    }

    pub fn backward(&mut self, dhs: &Array3<f64>) -> Array3<f64> {
        if self.cells.is_empty() {
            fatal(NnError::representation(
                "TimeRnn::backward",
                "backward called before forward",
            ));
        }
        let (n, t, hidden) = dhs.dim();
        ensure_shape("TimeRnn::backward", &[self.cells.len()], &[t]);
        let d = self.param.weight.nrows();

        let mut dxs = Array3::zeros((n, t, d));
        let mut dh = Array2::zeros((n, hidden));
        let mut total = Grad::zeros_like(&self.param);
        for step in (0..t).rev() {
            let upstream = &dhs.index_axis(Axis(1), step) + &dh;
            let cell = &mut self.cells[step];
            let (dx, dh_prev) = cell.backward(&upstream);
            dxs.index_axis_mut(Axis(1), step).assign(&dx);
            total.accumulate(&cell.grad);
            dh = dh_prev;
        }

        self.grad = total;
        self.dh = Some(dh);
        dxs
    }
}

impl Parameterized for TimeRnn {
    fn param(&self) -> Option<Param> {
        Some(self.param.clone())
    }

    fn grad(&self) -> Option<Grad> {
        Some(self.grad.clone())
    }

    fn set_param(&mut self, param: Param) {
        self.param.check_replacement("TimeRnn::set_param", &param);
        self.param = param;
    }
}
