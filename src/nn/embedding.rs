//! Модуль со слоями поиска по таблице эмбеддингов.
//!
//! * [`Embedding`] выбирает строки матрицы весов по индексам слов.
//! * [`TimeEmbedding`] делает то же самое для каждого шага последовательности.
//! * [`EmbeddingDot`] вычисляет скалярное произведение скрытого вектора и
//!   эмбеддинга целевого слова (используется в negative sampling).

use crate::error::{ensure_shape, fatal, NnError};
use crate::nn::layer::{cached, Layer, Parameterized};
use crate::params::{to_indices, Grad, Param, SharedMatrix};
use ndarray::{Array1, Array2, Array3, Axis};
use std::sync::Arc;

/// Таблица эмбеддингов формы `[vocab_size, dim]`.
///
/// Прямой проход выбирает строки по индексам, обратный проход
/// накапливает градиенты в тех же строках (повторяющиеся индексы
/// суммируются).
#[derive(Debug, Clone)]
pub struct Embedding {
    param: Param,
    grad: Grad,
    idx: Option<Vec<usize>>,
}

impl Embedding {
    pub fn new(weight: SharedMatrix) -> Self {
        let param = Param::new(weight);
        let grad = Grad::zeros_like(&param);
        Self { param, grad, idx: None }
    }

    pub fn vocab_size(&self) -> usize {
        self.param.weight.nrows()
    }

    pub fn dim(&self) -> usize {
        self.param.weight.ncols()
    }

    pub fn weight(&self) -> &SharedMatrix {
        &self.param.weight
    }

    /// Выбирает строки весов с индексами `ids`. Результат: `[ids.len(), dim]`.
    pub fn lookup(&mut self, ids: &[usize]) -> Array2<f64> {
        let vocab = self.vocab_size();
        if let Some(&bad) = ids.iter().find(|&&id| id >= vocab) {
            fatal(NnError::representation(
                "Embedding::forward",
                format!("id {} is out of range for a vocabulary of {}", bad, vocab),
            ));
        }
        self.idx = Some(ids.to_vec());
        self.param.weight.select(Axis(0), ids)
    }

    /// Распределяет строки `dout` по строкам градиента весов.
    pub fn scatter(&mut self, dout: &Array2<f64>) {
        let idx = cached("Embedding::backward", &self.idx);
        ensure_shape("Embedding::backward", &[idx.len(), self.dim()], dout.shape());

        let mut dw = Array2::zeros(self.param.weight.raw_dim());
        for (&id, row) in idx.iter().zip(dout.rows()) {
            let mut target = dw.row_mut(id);
            target += &row;
        }
        self.grad.weight = dw;
    }
}

impl Parameterized for Embedding {
    fn param(&self) -> Option<Param> {
        Some(self.param.clone())
    }

    fn grad(&self) -> Option<Grad> {
        Some(self.grad.clone())
    }

    fn set_param(&mut self, param: Param) {
        self.param.check_replacement("Embedding::set_param", &param);
        self.param = param;
    }
}

impl Layer for Embedding {
    /// `x` содержит индексы слов (столбец `N x 1`, строка `1 x N`
    /// или любая другая матрица, читаемая построчно).
    fn forward(&mut self, x: &Array2<f64>) -> Array2<f64> {
        let ids = to_indices("Embedding::forward", x.view());
        self.lookup(&ids)
    }

    /// Индексы не дифференцируемы, поэтому возвращается пустая матрица.
    fn backward(&mut self, dout: &Array2<f64>) -> Array2<f64> {
        self.scatter(dout);
        Array2::zeros((0, 0))
    }
}

/// Эмбеддинги для батча последовательностей индексов `(N, T)`.
///
/// Каждый шаг обрабатывается отдельным [`Embedding`], все они разделяют
/// одну матрицу весов; градиенты шагов суммируются.
#[derive(Debug, Clone)]
pub struct TimeEmbedding {
    param: Param,
    grad: Grad,
    steps: Vec<Embedding>,
}

impl TimeEmbedding {
    pub fn new(weight: SharedMatrix) -> Self {
        let param = Param::new(weight);
        let grad = Grad::zeros_like(&param);
        Self {
            param,
            grad,
            steps: Vec::new(),
        }
    }

    /// `xs` имеет форму `(N, T)`, результат `(N, T, dim)`.
    pub fn forward(&mut self, xs: &Array2<f64>) -> Array3<f64> {
        let (n, t) = xs.dim();
        let d = self.param.weight.ncols();
        let mut out = Array3::zeros((n, t, d));

        self.steps.clear();
        for j in 0..t {
            let mut layer = Embedding::new(Arc::clone(&self.param.weight));
            let ids = to_indices("TimeEmbedding::forward", xs.column(j).insert_axis(Axis(1)));
            let vectors = layer.lookup(&ids);
            out.index_axis_mut(Axis(1), j).assign(&vectors);
            self.steps.push(layer);
        }
        out
    }

    pub fn backward(&mut self, dout: &Array3<f64>) {
        if self.steps.is_empty() {
            fatal(NnError::representation(
                "TimeEmbedding::backward",
                "backward called before forward",
            ));
        }
        ensure_shape("TimeEmbedding::backward", &[self.steps.len()], &[dout.dim().1]);

        let mut total = Array2::zeros(self.param.weight.raw_dim());
        for (j, layer) in self.steps.iter_mut().enumerate() {
            layer.scatter(&dout.index_axis(Axis(1), j).to_owned());
            total += &layer.grad.weight;
        }
        self.grad.weight = total;
    }
}

impl Parameterized for TimeEmbedding {
    fn param(&self) -> Option<Param> {
        Some(self.param.clone())
    }

    fn grad(&self) -> Option<Grad> {
        Some(self.grad.clone())
    }

    fn set_param(&mut self, param: Param) {
        self.param.check_replacement("TimeEmbedding::set_param", &param);
        self.param = param;
    }
}

/// Скалярное произведение скрытого состояния и эмбеддинга цели.
///
/// Для каждой строки `i`: `score[i] = Σ_k W[ids[i], k] * h[i, k]`.
#[derive(Debug, Clone)]
pub struct EmbeddingDot {
    embed: Embedding,
    h: Option<Array2<f64>>,
    target_w: Option<Array2<f64>>,
}

impl EmbeddingDot {
    pub fn new(weight: SharedMatrix) -> Self {
        Self {
            embed: Embedding::new(weight),
            h: None,
            target_w: None,
        }
    }

    /// Возвращает столбец оценок формы `[N, 1]`.
    pub fn forward(&mut self, h: &Array2<f64>, ids: &[usize]) -> Array2<f64> {
        ensure_shape("EmbeddingDot::forward", &[ids.len(), self.embed.dim()], h.shape());
        let target_w = self.embed.lookup(ids);
        let score: Array1<f64> = (&target_w * h).sum_axis(Axis(1));

        self.h = Some(h.clone());
        self.target_w = Some(target_w);
        score.insert_axis(Axis(1))
    }

    /// Принимает градиент оценок (`[N, 1]` или `[1, N]`) и возвращает `dh`.
    pub fn backward(&mut self, dout: &Array2<f64>) -> Array2<f64> {
        let h = cached("EmbeddingDot::backward", &self.h);
        let target_w = cached("EmbeddingDot::backward", &self.target_w);
        ensure_shape("EmbeddingDot::backward", &[h.nrows()], &[dout.len()]);

        let dcol = Array1::from_iter(dout.iter().copied()).insert_axis(Axis(1));
        let dtarget_w = &dcol * h;
        let dh = &dcol * target_w;
        self.embed.scatter(&dtarget_w);
        dh
    }
}

impl Parameterized for EmbeddingDot {
    fn param(&self) -> Option<Param> {
        self.embed.param()
    }

    fn grad(&self) -> Option<Grad> {
        self.embed.grad()
    }

    fn set_param(&mut self, param: Param) {
        self.embed.set_param(param);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ids_column, shared};
    use ndarray::array;

    fn counting_weight(rows: usize, cols: usize) -> SharedMatrix {
        shared(Array2::from_shape_fn((rows, cols), |(i, j)| (i * cols + j) as f64))
    }

    #[test]
    fn test_embedding_forward_gathers_rows() {
        let mut layer = Embedding::new(counting_weight(7, 3));
        let out = layer.forward(&ids_column(&[1, 0, 3, 0]));
        assert_eq!(
            out,
            array![[3.0, 4.0, 5.0], [0.0, 1.0, 2.0], [9.0, 10.0, 11.0], [0.0, 1.0, 2.0]]
        );
    }

    #[test]
    fn test_embedding_backward_accumulates_repeated_ids() {
        let mut layer = Embedding::new(counting_weight(8, 3));
        layer.forward(&ids_column(&[1, 0, 3, 0]));
        let dout = array![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0], [6.0, 7.0, 8.0], [9.0, 10.0, 11.0]];
        let dx = layer.backward(&dout);
        assert_eq!(dx.dim(), (0, 0));

        let dw = layer.grad().unwrap().weight;
        assert_eq!(dw.row(0), array![12.0, 14.0, 16.0]);
        assert_eq!(dw.row(1), array![0.0, 1.0, 2.0]);
        assert_eq!(dw.row(3), array![6.0, 7.0, 8.0]);
        for r in [2, 4, 5, 6, 7] {
            assert!(dw.row(r).iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_embedding_rejects_out_of_range_id() {
        let mut layer = Embedding::new(counting_weight(3, 2));
        layer.lookup(&[5]);
    }

    #[test]
    fn test_embedding_accepts_row_of_ids() {
        let mut layer = Embedding::new(counting_weight(4, 2));
        let out = layer.forward(&array![[2.0, 1.0]]);
        assert_eq!(out, array![[4.0, 5.0], [2.0, 3.0]]);
    }

    #[test]
    fn test_embedding_dot_forward_and_backward() {
        let w = shared(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]]);
        let mut layer = EmbeddingDot::new(w);
        let h = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];

        let score = layer.forward(&h, &[1, 0, 3, 0]);
        assert_eq!(score, array![[7.0], [6.0], [45.0], [12.0]]);

        let dh = layer.backward(&array![[1.0], [2.0], [3.0], [4.0]]);
        assert_eq!(dh, array![[3.0, 4.0], [2.0, 4.0], [21.0, 24.0], [4.0, 8.0]]);

        // Row 0 is hit twice: 2*[2,2] + 4*[4,4].
        let dw = layer.grad().unwrap().weight;
        assert_eq!(dw.row(0), array![20.0, 20.0]);
        assert_eq!(dw.row(1), array![1.0, 1.0]);
    }

    #[test]
    fn test_time_embedding_sums_step_gradients() {
        let w = counting_weight(5, 2);
        let mut layer = TimeEmbedding::new(w);
        let xs = array![[0.0, 1.0, 0.0], [2.0, 0.0, 4.0]];

        let out = layer.forward(&xs);
        assert_eq!(out.dim(), (2, 3, 2));
        assert_eq!(out.index_axis(Axis(1), 2).row(1), array![8.0, 9.0]);

        layer.backward(&Array3::ones((2, 3, 2)));
        let dw = layer.grad().unwrap().weight;
        assert_eq!(dw.row(0), array![3.0, 3.0]);
        assert_eq!(dw.row(1), array![1.0, 1.0]);
        assert_eq!(dw.row(3), array![0.0, 0.0]);
    }
}
