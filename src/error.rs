// --- File: src/error.rs ---

//! Error types shared by every layer, model and training component.
//!
//! Two families live here. Shape and representation problems inside a
//! forward or backward pass are programming errors and abort training
//! through [`fatal`]. Configuration and vocabulary problems are ordinary
//! recoverable errors returned as [`Result`].

use thiserror::Error;

/// Errors produced by the training engine.
#[derive(Error, Debug)]
pub enum NnError {
    #[error("{op}: shape mismatch, expected {expected}, got {actual}")]
    ShapeMismatch {
        op: &'static str,
        expected: String,
        actual: String,
    },

    #[error("{op}: invalid data representation: {detail}")]
    Representation { op: &'static str, detail: String },

    #[error("word '{0}' is not in the vocabulary")]
    UnknownWord(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NnError>;

impl NnError {
    pub(crate) fn shape(op: &'static str, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        NnError::ShapeMismatch {
            op,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub(crate) fn representation(op: &'static str, detail: impl Into<String>) -> Self {
        NnError::Representation {
            op,
            detail: detail.into(),
        }
    }
}

/// Logs the error and aborts the current computation.
///
/// Used for invariants whose violation means the caller wired layers
/// together incorrectly; there is nothing sensible to resume from.
#[track_caller]
pub(crate) fn fatal(err: NnError) -> ! {
    log::error!("{}", err);
    panic!("{}", err)
}

/// Formats an ndarray shape the way error messages print it.
pub(crate) fn fmt_shape(shape: &[usize]) -> String {
    format!("{:?}", shape)
}

/// Panics with a shape error unless `actual == expected`.
#[track_caller]
pub(crate) fn ensure_shape(op: &'static str, expected: &[usize], actual: &[usize]) {
    if expected != actual {
        fatal(NnError::shape(op, fmt_shape(expected), fmt_shape(actual)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = NnError::shape("affine", "[2, 3]", "[3, 2]");
        assert_eq!(err.to_string(), "affine: shape mismatch, expected [2, 3], got [3, 2]");

        let err = NnError::UnknownWord("zebra".into());
        assert!(err.to_string().contains("zebra"));
    }

    #[test]
    #[should_panic(expected = "shape mismatch")]
    fn test_ensure_shape_panics() {
        ensure_shape("test", &[1, 2], &[2, 1]);
    }
}
