//! Модуль, содержащий реализации оптимизаторов для обновления весов модели.
//!
//! Оптимизатор получает текущие параметры и их градиенты и возвращает
//! новые параметры. Входные данные не изменяются: каждое обновленное
//! значение веса публикуется как новый `Arc`.

use crate::error::ensure_shape;
use crate::nn::layer::ensure_param_count;
use crate::params::{Grad, Param};
use ndarray::{azip, Array, Array1, Array2, Dimension, Ix1, Ix2, Zip};
use std::sync::Arc;

/// Трейт, определяющий общий интерфейс для всех оптимизаторов.
pub trait Optimizer {
    /// Выполняет один шаг оптимизации.
    ///
    /// # Аргументы
    ///
    /// * `params` - Текущие параметры, по одному на слот.
    /// * `grads` - Градиенты в том же порядке, что и `params`.
    ///
    /// # Возвращает
    ///
    /// Новые параметры в том же порядке.
    fn update(&mut self, params: &[Param], grads: &[Grad]) -> Vec<Param>;
}

fn check_pair(op: &'static str, param: &Param, grad: &Grad) {
    ensure_shape(op, param.weight.shape(), grad.weight.shape());
    if let (Some(w), Some(g)) = (&param.weight_h, &grad.weight_h) {
        ensure_shape(op, w.shape(), g.shape());
    }
    if let (Some(b), Some(g)) = (&param.bias, &grad.bias) {
        ensure_shape(op, &[b.len()], &[g.len()]);
    }
}

/// Реализация оптимизатора Stochastic Gradient Descent (SGD).
#[derive(Debug, Clone)]
pub struct Sgd {
    /// Скорость обучения (learning rate).
    lr: f64,
}

impl Sgd {
    /// Создает новый экземпляр оптимизатора SGD.
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }
}

impl Default for Sgd {
    fn default() -> Self {
        Self::new(0.01)
    }
}

fn sgd_step<D: Dimension>(value: &Array<f64, D>, grad: &Array<f64, D>, lr: f64) -> Array<f64, D> {
    let mut next = value.clone();
    azip!((p in &mut next, &g in grad) *p -= lr * g);
    next
}

impl Optimizer for Sgd {
    fn update(&mut self, params: &[Param], grads: &[Grad]) -> Vec<Param> {
        ensure_param_count("Sgd::update", params.len(), grads.len());
        params
            .iter()
            .zip(grads)
            .map(|(p, g)| {
                check_pair("Sgd::update", p, g);
                // param = param - lr * grad, независимо для каждого поля
                Param {
                    weight: Arc::new(sgd_step(&p.weight, &g.weight, self.lr)),
                    weight_h: match (&p.weight_h, &g.weight_h) {
                        (Some(w), Some(gw)) => Some(sgd_step(w, gw, self.lr)),
                        (w, _) => w.clone(),
                    },
                    bias: match (&p.bias, &g.bias) {
                        (Some(b), Some(gb)) => Some(sgd_step(b, gb, self.lr)),
                        (b, _) => b.clone(),
                    },
                }
            })
            .collect()
    }
}

/// Добавка в знаменателе шага Adam.
const ADAM_EPS: f64 = 1e-7;

/// Моменты первого и второго порядка для одного тензора.
#[derive(Debug, Clone)]
struct Moment<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> Moment<D> {
    fn zeros_like(value: &Array<f64, D>) -> Self {
        Self {
            m: Array::zeros(value.raw_dim()),
            v: Array::zeros(value.raw_dim()),
        }
    }

    /// Обновляет моменты и возвращает новое значение тензора.
    ///
    /// Элементы независимы, поэтому обход выполняется параллельно.
    fn step(&mut self, value: &Array<f64, D>, grad: &Array<f64, D>, lr_t: f64, beta1: f64, beta2: f64) -> Array<f64, D> {
        ensure_shape("Adam::update", self.m.shape(), value.shape());
        let mut next = value.clone();
        Zip::from(&mut next)
            .and(grad)
            .and(&mut self.m)
            .and(&mut self.v)
            .par_for_each(|w, &g, m, v| {
                *m += (1.0 - beta1) * (g - *m);
                *v += (1.0 - beta2) * (g * g - *v);
                *w -= lr_t * *m / (v.sqrt() + ADAM_EPS);
            });
        next
    }
}

/// Состояние Adam для одного слота параметров.
#[derive(Debug, Clone)]
struct SlotState {
    weight: Moment<Ix2>,
    weight_h: Option<Moment<Ix2>>,
    bias: Option<Moment<Ix1>>,
}

impl SlotState {
    fn new(param: &Param) -> Self {
        Self {
            weight: Moment::zeros_like(&param.weight),
            weight_h: param.weight_h.as_ref().map(Moment::zeros_like),
            bias: param.bias.as_ref().map(Moment::zeros_like),
        }
    }
}

/// Оптимизатор Adam.
///
/// Для каждого поля параметра (основной вес, рекуррентный вес, смещение)
/// хранятся собственные моменты `m` и `v`. Они создаются при первом вызове
/// `update` по формам переданных параметров.
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    iter: u64,
    state: Option<Vec<SlotState>>,
}

impl Adam {
    pub fn new(lr: f64, beta1: f64, beta2: f64) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            iter: 0,
            state: None,
        }
    }

    /// Количество выполненных шагов.
    pub fn iterations(&self) -> u64 {
        self.iter
    }

    /// Первый момент основного веса слота `slot`.
    pub fn first_moment(&self, slot: usize) -> Option<&Array2<f64>> {
        self.state.as_ref()?.get(slot).map(|s| &s.weight.m)
    }

    /// Второй момент основного веса слота `slot`.
    pub fn second_moment(&self, slot: usize) -> Option<&Array2<f64>> {
        self.state.as_ref()?.get(slot).map(|s| &s.weight.v)
    }

    /// Первый момент смещения слота `slot`, если у слота есть смещение.
    pub fn bias_first_moment(&self, slot: usize) -> Option<&Array1<f64>> {
        self.state.as_ref()?.get(slot)?.bias.as_ref().map(|m| &m.m)
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.001, 0.9, 0.999)
    }
}

impl Optimizer for Adam {
    fn update(&mut self, params: &[Param], grads: &[Grad]) -> Vec<Param> {
        ensure_param_count("Adam::update", params.len(), grads.len());
        let state = self
            .state
            .get_or_insert_with(|| params.iter().map(SlotState::new).collect());
        ensure_param_count("Adam::update", state.len(), params.len());

        self.iter += 1;
        let t = self.iter as f64;
        let lr_t = self.lr * (1.0 - self.beta2.powf(t)).sqrt() / (1.0 - self.beta1.powf(t));
        let (beta1, beta2) = (self.beta1, self.beta2);

        params
            .iter()
            .zip(grads)
            .zip(state.iter_mut())
            .map(|((p, g), slot)| {
                check_pair("Adam::update", p, g);
                let weight = slot.weight.step(&p.weight, &g.weight, lr_t, beta1, beta2);
                let weight_h = match (&p.weight_h, &g.weight_h, slot.weight_h.as_mut()) {
                    (Some(w), Some(gw), Some(mo)) => Some(mo.step(w, gw, lr_t, beta1, beta2)),
                    (w, _, _) => w.clone(),
                };
                let bias = match (&p.bias, &g.bias, slot.bias.as_mut()) {
                    (Some(b), Some(gb), Some(mo)) => Some(mo.step(b, gb, lr_t, beta1, beta2)),
                    (b, _, _) => b.clone(),
                };
                Param {
                    weight: Arc::new(weight),
                    weight_h,
                    bias,
                }
            })
            .collect()
    }
}
