use foldboost_frame::FrameError;
use thiserror::Error;

/// Errors returned by the boosting backends.
#[derive(Debug, Error)]
pub enum GbdtError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid training data: {0}")]
    InvalidData(String),

    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    #[error("model is not fitted")]
    NotFitted,

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encoding error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Result type for boosting operations
pub type Result<T> = std::result::Result<T, GbdtError>;
