// --- Файл: src/metrics/running.rs ---

//! Скользящая статистика потерь во время обучения.

/// Онлайн вычисление среднего значения.
///
/// Инкрементальная формула не хранит значения и не накапливает большую сумму.
#[derive(Debug, Clone, Default)]
pub struct RunningMean {
    mean: f64,
    count: usize,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет значение.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Возвращает среднее накопленных значений и начинает окно заново.
    ///
    /// `None`, если с прошлого вызова ничего не добавлялось.
    pub fn take(&mut self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        let mean = self.mean;
        self.reset();
        Some(mean)
    }

    /// Сбрасывает состояние.
    pub fn reset(&mut self) {
        self.mean = 0.0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_averages_window() {
        let mut rm = RunningMean::new();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            rm.update(v);
        }
        assert!((rm.take().unwrap() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_take_resets_window() {
        let mut rm = RunningMean::new();
        assert_eq!(rm.take(), None);

        rm.update(2.0);
        rm.update(4.0);
        assert_eq!(rm.take(), Some(3.0));
        assert!(rm.is_empty());

        rm.update(10.0);
        assert_eq!(rm.take(), Some(10.0));
    }
}
