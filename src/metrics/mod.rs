// --- Файл: src/metrics/mod.rs ---

//! Метрики обучения и качества векторов слов.
//!
//! - [`RunningMean`]: среднее значение потерь за окно итераций
//! - [`cos_similarity`], [`most_similar`], [`analogy`]: запросы к матрице векторов слов

pub mod running;
pub mod similarity;

pub use running::RunningMean;
pub use similarity::{analogy, cos_similarity, most_similar};
