//! Error types for the yatsm library.

use thiserror::Error;

/// Result type alias for segmentation operations.
pub type Result<T> = std::result::Result<T, YatsmError>;

/// Errors that can occur while configuring, fitting or querying time series models.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum YatsmError {
    /// Invalid or incomplete configuration, detected before any processing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Too few usable observations for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Numerical failure while fitting a regression.
    #[error("fit failure: {0}")]
    FitFailure(String),

    /// More than one segment record matches a lookup date.
    #[error("ambiguous segment lookup: {matches} records match date {date}")]
    AmbiguousSegment { date: i64, matches: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Processing was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,
}

impl YatsmError {
    /// Whether the error should abort a whole batch rather than a single pixel.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Cancelled)
    }
}
