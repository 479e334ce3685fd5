// --- Файл: src/data/sampler.rs ---

//! Стратегии перебора обучающих примеров для `Trainer`.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Трейт для сэмплеров - генераторов индексов.
pub trait Sampler: Iterator<Item = usize> {
    /// Возвращает общее количество образцов.
    fn len(&self) -> usize;

    /// Проверяет, пуст ли сэмплер.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Начинает новый проход по данным.
    fn reset(&mut self);
}

/// Случайный сэмплер - возвращает индексы в случайном порядке.
///
/// Каждый `reset` заново перемешивает индексы тем же генератором,
/// поэтому при фиксированном seed вся последовательность эпох воспроизводима.
#[derive(Debug, Clone)]
pub struct RandomSampler<R = StdRng> {
    indices: Vec<usize>,
    current: usize,
    rng: R,
}

impl RandomSampler<StdRng> {
    /// Создает случайный сэмплер с фиксированным seed для воспроизводимости.
    pub fn with_seed(len: usize, seed: u64) -> Self {
        Self::with_rng(len, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomSampler<R> {
    /// Создает сэмплер, использующий переданный генератор.
    pub fn with_rng(len: usize, rng: R) -> Self {
        let mut sampler = Self {
            indices: (0..len).collect(),
            current: 0,
            rng,
        };
        sampler.shuffle();
        sampler
    }

    fn shuffle(&mut self) {
        self.indices.shuffle(&mut self.rng);
    }
}

impl<R: Rng> Iterator for RandomSampler<R> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.indices.get(self.current).copied()?;
        self.current += 1;
        Some(idx)
    }
}

impl<R: Rng> Sampler for RandomSampler<R> {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn reset(&mut self) {
        self.current = 0;
        self.shuffle();
    }
}

/// Батч-сэмплер - группирует индексы в батчи.
#[derive(Debug, Clone)]
pub struct BatchSampler<S: Sampler> {
    sampler: S,
    batch_size: usize,
    drop_last: bool,
}

impl<S: Sampler> BatchSampler<S> {
    /// Создает батч-сэмплер.
    ///
    /// # Аргументы
    ///
    /// * `sampler` - Внутренний сэмплер для генерации индексов
    /// * `batch_size` - Размер батча (больше нуля)
    /// * `drop_last` - Отбросить последний неполный батч
    pub fn new(sampler: S, batch_size: usize, drop_last: bool) -> Self {
        Self {
            sampler,
            batch_size,
            drop_last,
        }
    }

    /// Возвращает количество батчей.
    pub fn num_batches(&self) -> usize {
        let n = self.sampler.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    /// Сбрасывает сэмплер.
    pub fn reset(&mut self) {
        self.sampler.reset();
    }
}

impl<S: Sampler> Iterator for BatchSampler<S> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<usize> = self.sampler.by_ref().take(self.batch_size).collect();

        if batch.is_empty() {
            return None;
        }

        if batch.len() < self.batch_size && self.drop_last {
            return None;
        }

        Some(batch)
    }
}
