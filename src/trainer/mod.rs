//! Mini-batch training loop.
//!
//! Each epoch shuffles the sample indices, walks the full batches in that
//! order and runs one optimizer step per batch:
//!
//! ```text
//! forward -> backward -> params/grads -> merge_shared -> update -> expand -> update_params
//! ```

pub mod dedup;

pub use dedup::{merge_shared, MergedParams};

use crate::data::sampler::{BatchSampler, RandomSampler};
use crate::error::{NnError, Result};
use crate::metrics::RunningMean;
use crate::models::Model;
use crate::optimizers::Optimizer;
use crate::params::SharedMatrix;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Iterations between two loss reports when nothing else is configured.
pub const DEFAULT_EVAL_INTERVAL: usize = 20;

pub struct Trainer<M: Model, O: Optimizer> {
    model: M,
    optimizer: O,
    eval_interval: usize,
    rng: StdRng,
    loss_history: Vec<f64>,
    current_epoch: usize,
}

impl<M: Model, O: Optimizer> Trainer<M, O> {
    /// Creates a trainer that shuffles with an OS-seeded generator.
    pub fn new(model: M, optimizer: O) -> Self {
        Self {
            model,
            optimizer,
            eval_interval: DEFAULT_EVAL_INTERVAL,
            rng: StdRng::from_os_rng(),
            loss_history: Vec::new(),
            current_epoch: 0,
        }
    }

    /// Number of iterations averaged into each loss report.
    pub fn eval_interval(mut self, interval: usize) -> Self {
        self.eval_interval = interval;
        self
    }

    /// Makes batch order reproducible.
    pub fn seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Trains for `max_epoch` epochs on the rows of `x` and `t`.
    ///
    /// Rows of `x` and `t` stay paired when shuffled. Every epoch runs
    /// `N / batch_size` steps; a trailing partial batch is skipped.
    pub fn fit(&mut self, x: &Array2<f64>, t: &Array2<f64>, max_epoch: usize, batch_size: usize) -> Result<()> {
        let data_size = x.nrows();
        if data_size == 0 {
            return Err(NnError::InvalidConfig("training data is empty".into()));
        }
        if t.nrows() != data_size {
            return Err(NnError::InvalidConfig(format!(
                "{} input rows but {} label rows",
                data_size,
                t.nrows()
            )));
        }
        if batch_size == 0 {
            return Err(NnError::InvalidConfig("batch size must be positive".into()));
        }
        if batch_size > data_size {
            return Err(NnError::InvalidConfig(format!(
                "batch size {} exceeds the {} available samples",
                batch_size, data_size
            )));
        }
        if self.eval_interval == 0 {
            return Err(NnError::InvalidConfig("eval interval must be positive".into()));
        }

        let order = RandomSampler::with_rng(data_size, StdRng::from_rng(&mut self.rng));
        let mut batches = BatchSampler::new(order, batch_size, true);
        let max_iters = batches.num_batches();
        let mut running = RunningMean::new();

        log::info!(
            "training on {} samples: {} epochs, {} iterations per epoch",
            data_size,
            max_epoch,
            max_iters
        );

        for epoch in 0..max_epoch {
            if epoch > 0 {
                batches.reset();
            }
            for (iter, idx) in batches.by_ref().enumerate() {
                let bx = x.select(Axis(0), &idx);
                let bt = t.select(Axis(0), &idx);
                running.update(self.step(&bx, &bt));

                if iter % self.eval_interval == 0 {
                    if let Some(avg) = running.take() {
                        log::info!(
                            "| epoch {} | iter {} / {} | loss {:.4}",
                            self.current_epoch + 1,
                            iter + 1,
                            max_iters,
                            avg
                        );
                        self.loss_history.push(avg);
                    }
                }
            }
            self.current_epoch += 1;
        }
        Ok(())
    }

    /// One optimizer step on a single batch. Returns the batch loss.
    fn step(&mut self, x: &Array2<f64>, t: &Array2<f64>) -> f64 {
        let loss = self.model.forward(x, t);
        self.model.backward();

        let merged = merge_shared(&self.model.params(), &self.model.grads());
        let updated = self.optimizer.update(&merged.params, &merged.grads);
        self.model.update_params(merged.expand(updated));
        loss
    }

    /// Average losses recorded at every report, oldest first.
    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    /// Epochs completed so far, across all `fit` calls.
    pub fn current_epoch(&self) -> usize {
        self.current_epoch
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Weight of the model's first parameter: the word vectors for the
    /// CBOW models.
    pub fn word_vecs(&self) -> Option<SharedMatrix> {
        self.model.params().first().map(|p| Arc::clone(&p.weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Activation, TwoLayerNet};
    use crate::nn::ParamSet;
    use crate::optimizers::Sgd;
    use ndarray::array;

    fn trainer() -> Trainer<TwoLayerNet, Sgd> {
        let mut rng = StdRng::seed_from_u64(7);
        let net = TwoLayerNet::new(2, 4, 2, Activation::Sigmoid, &mut rng).unwrap();
        Trainer::new(net, Sgd::new(0.1)).seed(7)
    }

    #[test]
    fn test_fit_rejects_bad_data() {
        let mut tr = trainer();
        let x = array![[0.0, 1.0], [1.0, 0.0]];
        let t = array![[1.0], [0.0]];

        let empty = Array2::<f64>::zeros((0, 2));
        assert!(matches!(tr.fit(&empty, &empty, 1, 1), Err(NnError::InvalidConfig(_))));
        assert!(matches!(tr.fit(&x, &array![[1.0]], 1, 1), Err(NnError::InvalidConfig(_))));
        assert!(matches!(tr.fit(&x, &t, 1, 0), Err(NnError::InvalidConfig(_))));
        assert!(matches!(tr.fit(&x, &t, 1, 3), Err(NnError::InvalidConfig(_))));
        assert_eq!(tr.current_epoch(), 0);
    }

    #[test]
    fn test_loss_reported_every_interval() {
        let mut tr = trainer().eval_interval(2);
        let x = array![[0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0], [0.5, 0.5]];
        let t = array![[1.0], [0.0], [1.0], [0.0], [1.0]];

        // 5 samples, batch 1 -> iterations 0..5, reports at 0, 2 and 4.
        tr.fit(&x, &t, 2, 1).unwrap();
        assert_eq!(tr.current_epoch(), 2);
        assert_eq!(tr.loss_history().len(), 6);
        assert!(tr.loss_history().iter().all(|l| l.is_finite()));
    }

    #[test]
    fn test_partial_batch_is_dropped() {
        let mut tr = trainer().eval_interval(1);
        let x = array![[0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let t = array![[1.0], [0.0], [1.0]];
        tr.fit(&x, &t, 1, 2).unwrap();
        assert_eq!(tr.loss_history().len(), 1);
    }

    #[test]
    fn test_word_vecs_is_first_parameter() {
        let tr = trainer();
        let w = tr.word_vecs().unwrap();
        assert!(Arc::ptr_eq(&w, &tr.model().params()[0].weight));
    }
}
