use foldboost_frame::FrameError;
use foldboost_gbdt::{Backend, GbdtError};
use foldboost_validation::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while running an experiment.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("logging directory {0} already exists (set overwrite to replace it)")]
    DirectoryExists(PathBuf),

    #[error("logging directory {0} is locked by another run")]
    DirectoryLocked(PathBuf),

    #[error("not supported gbdt_type ({gbdt_type}) or type_of_target ({target_type})")]
    UnsupportedConfiguration {
        gbdt_type: String,
        target_type: String,
    },

    #[error("index does not match: expected '{expected}', found {found:?}")]
    IndexMismatch {
        expected: String,
        found: Option<String>,
    },

    #[error("train and test columns differ: {train:?} vs {test:?}")]
    ColumnMismatch {
        train: Vec<String>,
        test: Vec<String>,
    },

    #[error("model backend {actual} does not match declared backend {expected}")]
    BackendMismatch { expected: Backend, actual: Backend },

    #[error("model has no trained booster")]
    NotFitted,

    #[error("plot error: {0}")]
    Plot(String),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("model error: {0}")]
    Gbdt(#[from] GbdtError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for experiment operations
pub type Result<T> = std::result::Result<T, ExperimentError>;
