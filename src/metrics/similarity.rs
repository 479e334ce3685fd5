//! Nearest-neighbour queries over a learned word-vector matrix.

use crate::data::corpus::Vocabulary;
use crate::error::{fmt_shape, NnError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;

/// Added to each norm so zero vectors score 0 instead of NaN.
const NORM_EPS: f64 = 1e-8;

/// Cosine similarity of two vectors of the same length.
pub fn cos_similarity(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let nx = x.dot(&x).sqrt() + NORM_EPS;
    let ny = y.dot(&y).sqrt() + NORM_EPS;
    x.dot(&y) / (nx * ny)
}

fn check_matrix(vocab: &Vocabulary, matrix: &Array2<f64>) -> Result<()> {
    if matrix.nrows() != vocab.len() {
        return Err(NnError::shape(
            "similarity",
            format!("{} rows (one per word)", vocab.len()),
            fmt_shape(matrix.shape()),
        ));
    }
    Ok(())
}

/// Sorts `(id, score)` by descending score and keeps the first `top`.
fn ranked(vocab: &Vocabulary, mut scored: Vec<(usize, f64)>, top: usize) -> Vec<(String, f64)> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .take(top)
        .filter_map(|(id, score)| vocab.word(id).map(|w| (w.to_string(), score)))
        .collect()
}

/// The `top` words whose vectors are closest to `query`, best first.
///
/// The query word itself is never part of the result.
pub fn most_similar(query: &str, vocab: &Vocabulary, matrix: &Array2<f64>, top: usize) -> Result<Vec<(String, f64)>> {
    check_matrix(vocab, matrix)?;
    let query_id = vocab.id(query)?;
    let query_vec = matrix.row(query_id);

    let scored = (0..matrix.nrows())
        .into_par_iter()
        .filter(|&id| id != query_id)
        .map(|id| (id, cos_similarity(matrix.row(id), query_vec)))
        .collect();
    Ok(ranked(vocab, scored, top))
}

/// Solves `a : b = c : ?` by ranking words against the normalised
/// `b - a + c`.
///
/// Scores are raw dot products with that unit vector, so longer word
/// vectors rank higher. `a`, `b` and `c` are excluded from the answer.
pub fn analogy(
    a: &str,
    b: &str,
    c: &str,
    vocab: &Vocabulary,
    matrix: &Array2<f64>,
    top: usize,
) -> Result<Vec<(String, f64)>> {
    check_matrix(vocab, matrix)?;
    let ids = [vocab.id(a)?, vocab.id(b)?, vocab.id(c)?];

    let mut query: Array1<f64> = &matrix.row(ids[1]) - &matrix.row(ids[0]) + matrix.row(ids[2]);
    let norm = query.dot(&query).sqrt() + NORM_EPS;
    query /= norm;

    let scores = matrix.dot(&query);
    let scored = scores
        .iter()
        .enumerate()
        .filter(|(id, _)| !ids.contains(id))
        .map(|(id, &s)| (id, s))
        .collect();
    log::debug!("analogy {} : {} = {} : ?", a, b, c);
    Ok(ranked(vocab, scored, top))
}
