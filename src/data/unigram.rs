// --- File: src/data/unigram.rs ---

//! Unigram-distribution sampler for negative sampling.
//!
//! Word frequencies are raised to `power` (usually 0.75) and normalized.
//! For every target a fresh copy of the distribution has the target removed
//! and `sample_size` words are drawn from it without replacement.

use crate::error::{fatal, NnError, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform random numbers used by the sampler.
///
/// Every [`rand::Rng`] implements it. Tests can plug in a deterministic
/// source instead.
pub trait UniformSource {
    /// Returns a value in `[0, upper)`.
    fn next_below(&mut self, upper: f64) -> f64;
}

impl<R: Rng> UniformSource for R {
    fn next_below(&mut self, upper: f64) -> f64 {
        self.random::<f64>() * upper
    }
}

/// Produces negative examples for a batch of target word IDs.
pub trait NegativeSampler {
    /// Returns a `targets.len() x sample_size` matrix of word IDs, none of
    /// which equals the target of its row.
    fn negative_sample(&mut self, targets: &[usize]) -> Array2<usize>;

    fn sample_size(&self) -> usize;
}

/// Weighted sampler over the smoothed unigram distribution of a corpus.
#[derive(Debug, Clone)]
pub struct UnigramSampler<U = StdRng> {
    sample_size: usize,
    word_p: Vec<f64>,
    source: U,
}

impl UnigramSampler<StdRng> {
    /// Builds a sampler driven by a seeded [`StdRng`].
    pub fn with_seed(corpus: &[usize], power: f64, sample_size: usize, seed: u64) -> Result<Self> {
        Self::new(corpus, power, sample_size, StdRng::seed_from_u64(seed))
    }
}

impl<U: UniformSource> UnigramSampler<U> {
    pub fn new(corpus: &[usize], power: f64, sample_size: usize, source: U) -> Result<Self> {
        let vocab_size = match corpus.iter().max() {
            Some(&max) => max + 1,
            None => return Err(NnError::InvalidConfig("corpus is empty".into())),
        };
        if !(power > 0.0 && power.is_finite()) {
            return Err(NnError::InvalidConfig(format!(
                "power must be a positive number, got {}",
                power
            )));
        }

        let mut counts = vec![0usize; vocab_size];
        for &id in corpus {
            counts[id] += 1;
        }
        let distinct = counts.iter().filter(|&&c| c > 0).count();
        if sample_size + 1 > distinct {
            return Err(NnError::InvalidConfig(format!(
                "sample size {} needs at least {} distinct words, corpus has {}",
                sample_size,
                sample_size + 1,
                distinct
            )));
        }

        let mut word_p: Vec<f64> = counts.iter().map(|&c| (c as f64).powf(power)).collect();
        let total: f64 = word_p.iter().sum();
        word_p.iter_mut().for_each(|p| *p /= total);

        log::debug!(
            "unigram sampler: vocab {}, distinct words {}, sample size {}",
            vocab_size,
            distinct,
            sample_size
        );
        Ok(Self {
            sample_size,
            word_p,
            source,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.word_p.len()
    }

    /// Smoothed, normalized probability of every word.
    pub fn distribution(&self) -> &[f64] {
        &self.word_p
    }

    fn sample_row(&mut self, target: usize) -> Vec<usize> {
        let mut p = self.word_p.clone();
        p[target] = 0.0;
        let total: f64 = p.iter().sum();
        p.iter_mut().for_each(|w| *w /= total);

        let mut pool: Vec<usize> = (0..p.len()).filter(|&i| p[i] > 0.0).collect();
        let mut remaining: f64 = pool.iter().map(|&i| p[i]).sum();
        let mut drawn = Vec::with_capacity(self.sample_size);

        for _ in 0..self.sample_size {
            let mut r = self.source.next_below(remaining);
            // Rounding can leave r >= 0 after the walk; the last candidate absorbs it.
            let mut pick = pool.len() - 1;
            for (pos, &word) in pool.iter().enumerate() {
                r -= p[word];
                if r < 0.0 {
                    pick = pos;
                    break;
                }
            }
            let word = pool.remove(pick);
            remaining -= p[word];
            drawn.push(word);
        }
        drawn
    }
}

impl<U: UniformSource> NegativeSampler for UnigramSampler<U> {
    fn negative_sample(&mut self, targets: &[usize]) -> Array2<usize> {
        let vocab = self.vocab_size();
        let mut out = Array2::zeros((targets.len(), self.sample_size));
        for (i, &target) in targets.iter().enumerate() {
            if target >= vocab {
                fatal(NnError::representation(
                    "UnigramSampler::negative_sample",
                    format!("target {} is out of range for a vocabulary of {}", target, vocab),
                ));
            }
            for (j, word) in self.sample_row(target).into_iter().enumerate() {
                out[[i, j]] = word;
            }
        }
        out
    }

    fn sample_size(&self) -> usize {
        self.sample_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Always lands at the same relative position of the interval.
    struct FixedFraction(f64);

    impl UniformSource for FixedFraction {
        fn next_below(&mut self, upper: f64) -> f64 {
            self.0 * upper
        }
    }

    const CORPUS: [usize; 8] = [0, 1, 2, 3, 4, 1, 2, 3];

    #[test]
    fn test_distribution_is_smoothed_and_normalized() {
        let sampler = UnigramSampler::new(&CORPUS, 0.75, 2, FixedFraction(0.3)).unwrap();
        let p = sampler.distribution();
        assert_eq!(p.len(), 5);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((p[1] / p[0] - 2f64.powf(0.75)).abs() < 1e-12);
    }

    #[test]
    fn test_negative_sample_with_fixed_source() {
        let mut sampler = UnigramSampler::new(&CORPUS, 0.75, 2, FixedFraction(0.3)).unwrap();
        let got = sampler.negative_sample(&[1, 3, 0]);
        assert_eq!(got, array![[2, 3], [1, 2], [2, 1]]);
    }

    #[test]
    fn test_never_draws_target_or_duplicates() {
        let corpus: Vec<usize> = (0..200).map(|i| (i * 7) % 10).collect();
        let mut sampler = UnigramSampler::with_seed(&corpus, 0.75, 5, 42).unwrap();
        let targets: Vec<usize> = (0..10).cycle().take(100).collect();
        let samples = sampler.negative_sample(&targets);

        for (row, &target) in samples.rows().into_iter().zip(&targets) {
            let mut seen: Vec<usize> = row.to_vec();
            assert!(!seen.contains(&target));
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), 5);
        }
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let mut a = UnigramSampler::with_seed(&CORPUS, 0.75, 2, 7).unwrap();
        let mut b = UnigramSampler::with_seed(&CORPUS, 0.75, 2, 7).unwrap();
        assert_eq!(a.negative_sample(&[0, 1, 2]), b.negative_sample(&[0, 1, 2]));
    }

    #[test]
    fn test_sample_size_can_exhaust_the_vocabulary() {
        // Five distinct words: excluding the target leaves exactly four.
        let mut sampler = UnigramSampler::new(&CORPUS, 0.75, 4, FixedFraction(0.999_999)).unwrap();
        let mut row = sampler.negative_sample(&[2]).row(0).to_vec();
        row.sort_unstable();
        assert_eq!(row, vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        assert!(matches!(
            UnigramSampler::new(&[], 0.75, 1, FixedFraction(0.5)),
            Err(NnError::InvalidConfig(_))
        ));
        assert!(matches!(
            UnigramSampler::new(&CORPUS, 0.75, 5, FixedFraction(0.5)),
            Err(NnError::InvalidConfig(_))
        ));
        assert!(matches!(
            UnigramSampler::new(&CORPUS, 0.0, 1, FixedFraction(0.5)),
            Err(NnError::InvalidConfig(_))
        ));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_rejects_unknown_target() {
        let mut sampler = UnigramSampler::new(&CORPUS, 0.75, 2, FixedFraction(0.3)).unwrap();
        sampler.negative_sample(&[9]);
    }
}
