// --- Файл: src/config.rs ---

//! Конфигурация обучения CBOW.
//!
//! Конфигурация читается из JSON. Отсутствующие поля принимают значения
//! по умолчанию, поэтому `{}` является корректным файлом.

use crate::error::{NnError, Result};
use crate::optimizers::Adam;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Параметры одного запуска обучения.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Количество слов контекста с каждой стороны от цели
    pub window_size: usize,
    /// Размерность векторов слов
    pub hidden_size: usize,
    pub batch_size: usize,
    pub max_epoch: usize,
    /// Через сколько итераций выводить средний loss
    pub eval_interval: usize,
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    /// Степень сглаживания униграммного распределения
    pub power: f64,
    /// Количество отрицательных примеров на одну цель
    pub sample_size: usize,
    /// Seed для инициализации весов, сэмплера и перемешивания.
    /// `None` - случайный запуск.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            window_size: 1,
            hidden_size: 5,
            batch_size: 3,
            max_epoch: 1000,
            eval_interval: 20,
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            power: 0.75,
            sample_size: 5,
            seed: None,
        }
    }
}

impl TrainConfig {
    /// Разбирает конфигурацию из JSON-строки и проверяет ее.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Загружает конфигурацию из JSON-файла.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        log::debug!("loaded config from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }

    /// Сериализует конфигурацию в форматированный JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_epoch(mut self, max_epoch: usize) -> Self {
        self.max_epoch = max_epoch;
        self
    }

    /// Проверяет диапазоны всех полей.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("window_size", self.window_size),
            ("hidden_size", self.hidden_size),
            ("batch_size", self.batch_size),
            ("eval_interval", self.eval_interval),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(NnError::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(NnError::InvalidConfig(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(NnError::InvalidConfig(format!("{} must lie in [0, 1), got {}", name, beta)));
            }
        }
        if !(self.power.is_finite() && self.power > 0.0) {
            return Err(NnError::InvalidConfig(format!("power must be positive, got {}", self.power)));
        }
        Ok(())
    }

    /// Оптимизатор Adam с параметрами из конфигурации.
    pub fn optimizer(&self) -> Adam {
        Adam::new(self.learning_rate, self.beta1, self.beta2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = TrainConfig::from_json_str("{}").unwrap();
        assert_eq!(config, TrainConfig::default());
        assert_eq!(config.hidden_size, 5);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_partial_override() {
        let config = TrainConfig::from_json_str(r#"{"window_size": 2, "seed": 42}"#).unwrap();
        assert_eq!(config.window_size, 2);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.batch_size, 3);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = TrainConfig::default().with_seed(1).with_max_epoch(10);
        let parsed = TrainConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            r#"{"batch_size": 0}"#,
            r#"{"learning_rate": -1.0}"#,
            r#"{"beta2": 1.0}"#,
            r#"{"power": 0.0}"#,
        ];
        for json in bad {
            assert!(
                matches!(TrainConfig::from_json_str(json), Err(NnError::InvalidConfig(_))),
                "{} accepted",
                json
            );
        }
        assert!(matches!(TrainConfig::from_json_str("[1, 2]"), Err(NnError::Json(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            TrainConfig::from_path("/nonexistent/train.json"),
            Err(NnError::Io(_))
        ));
    }
}
