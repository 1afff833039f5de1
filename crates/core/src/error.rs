//! Error types for MAT Engine

use thiserror::Error;

/// Main error type for MAT Engine operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Too few distinct dates (or no usable feature column) to decompose.
    #[error("Insufficient data for field '{field_id}': {reason}")]
    InsufficientData { field_id: String, reason: String },

    /// Non-finite values reached the decomposition.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// The classifier has neither a residual baseline nor a fixed threshold.
    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("Size mismatch in {context}: expected {expected}, got {actual}")]
    SizeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Data-availability conditions the caller should answer with
    /// "not enough data yet" instead of treating as a failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientData { .. }
                | Error::NumericalInstability(_)
                | Error::InsufficientHistory(_)
        )
    }

    /// User-facing hint for recoverable errors.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Error::InsufficientData { .. } => {
                Some("Not enough cloud-free scenes yet; re-run after the next acquisition.")
            }
            Error::NumericalInstability(_) => {
                Some("Input contains invalid index values; check the scene quality masks.")
            }
            Error::InsufficientHistory(_) => {
                Some("No residual history for this field yet; re-run after the next scene.")
            }
            _ => None,
        }
    }
}

/// Result type alias for MAT Engine operations
pub type Result<T> = std::result::Result<T, Error>;
