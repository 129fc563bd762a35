//! Error types for the frame crate

use thiserror::Error;

/// Errors raised while building, reshaping or persisting frames
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("column {name} has {got} rows, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("column {name} has dtype {actual}, expected {expected}")]
    InvalidDtype {
        name: String,
        actual: String,
        expected: String,
    },

    #[error("invalid npy data: {0}")]
    InvalidNpy(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for frame operations
pub type Result<T> = std::result::Result<T, FrameError>;
