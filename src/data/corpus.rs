//! Text preprocessing: word IDs, context windows, one-hot encodings.

use crate::error::{fatal, NnError, Result};
use crate::params::to_indices;
use ndarray::{Array2, Array3};
use std::collections::HashMap;

/// Bijective mapping between words and dense IDs, assigned in order of
/// first appearance.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    word_to_id: HashMap<String, usize>,
    id_to_word: Vec<String>,
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        self.id_to_word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_word.is_empty()
    }

    pub fn id(&self, word: &str) -> Result<usize> {
        self.word_to_id
            .get(word)
            .copied()
            .ok_or_else(|| NnError::UnknownWord(word.to_string()))
    }

    pub fn word(&self, id: usize) -> Option<&str> {
        self.id_to_word.get(id).map(String::as_str)
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.id_to_word.iter().map(String::as_str)
    }

    fn insert(&mut self, word: &str) -> usize {
        if let Some(&id) = self.word_to_id.get(word) {
            return id;
        }
        let id = self.id_to_word.len();
        self.word_to_id.insert(word.to_string(), id);
        self.id_to_word.push(word.to_string());
        id
    }
}

/// Lower-cases the text, splits the period off as its own token and
/// assigns IDs in order of first appearance.
///
/// Returns the corpus as a sequence of IDs together with the vocabulary.
pub fn preprocess(text: &str) -> (Vec<usize>, Vocabulary) {
    let text = text.to_lowercase().replace('.', " .");
    let mut vocab = Vocabulary::default();
    let corpus = text.split_whitespace().map(|w| vocab.insert(w)).collect();
    (corpus, vocab)
}

/// Builds CBOW training pairs from a corpus.
///
/// Returns `contexts` of shape `(N, 2 * window)` (left neighbours first,
/// nearest last, then right neighbours nearest first) and `target` of shape
/// `(N, 1)`, where `N = corpus.len() - 2 * window`.
pub fn create_contexts_target(corpus: &[usize], window: usize) -> Result<(Array2<f64>, Array2<f64>)> {
    if window == 0 {
        return Err(NnError::InvalidConfig("window size must be positive".into()));
    }
    if corpus.len() <= 2 * window {
        return Err(NnError::InvalidConfig(format!(
            "corpus of {} words is too short for window size {}",
            corpus.len(),
            window
        )));
    }

    let n = corpus.len() - 2 * window;
    let offsets: Vec<isize> = (-(window as isize)..=window as isize).filter(|&o| o != 0).collect();

    let contexts = Array2::from_shape_fn((n, 2 * window), |(i, j)| {
        let center = (i + window) as isize;
        corpus[(center + offsets[j]) as usize] as f64
    });
    let target = Array2::from_shape_fn((n, 1), |(i, _)| corpus[i + window] as f64);
    Ok((contexts, target))
}

#[track_caller]
fn ensure_ids_in_range(op: &'static str, ids: &[usize], vocab_size: usize) {
    if let Some(&bad) = ids.iter().find(|&&id| id >= vocab_size) {
        fatal(NnError::representation(
            op,
            format!("id {} is out of range for a vocabulary of {}", bad, vocab_size),
        ));
    }
}

/// One-hot rows for a list of IDs: shape `(ids.len(), vocab_size)`.
pub fn one_hot(ids: &[usize], vocab_size: usize) -> Array2<f64> {
    ensure_ids_in_range("one_hot", ids, vocab_size);
    let mut out = Array2::zeros((ids.len(), vocab_size));
    for (i, &id) in ids.iter().enumerate() {
        out[[i, id]] = 1.0;
    }
    out
}

/// One-hot encodes an `(N, C)` matrix of IDs into `(N, C, vocab_size)`.
pub fn convert_one_hot(ids: &Array2<f64>, vocab_size: usize) -> Array3<f64> {
    let (n, c) = ids.dim();
    let flat = to_indices("convert_one_hot", ids.view());
    ensure_ids_in_range("convert_one_hot", &flat, vocab_size);
    let mut out = Array3::zeros((n, c, vocab_size));
    for (k, &id) in flat.iter().enumerate() {
        out[[k / c, k % c, id]] = 1.0;
    }
    out
}
