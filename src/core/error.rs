use std::io;

use thiserror::Error;

/// Failures that leave the recorder untouched but abort the requested
/// persistence or reshaping operation.
///
/// Missing values on the read path are never errors; accessors return `None`.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed net data: {0}")]
    Format(String),

    #[error("shape mismatch for {what}: expected {expected} values, found {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
}

impl HistoryError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;
