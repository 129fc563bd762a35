use foldboost_gbdt::GbdtError;
use thiserror::Error;

/// Errors from splitting and fold-wise training.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid split: {0}")]
    InvalidSplit(String),

    #[error("{models} models supplied for {folds} folds")]
    FoldCountMismatch { models: usize, folds: usize },

    #[error("{what} has {got} rows, expected {expected}")]
    LengthMismatch {
        what: String,
        expected: usize,
        got: usize,
    },

    #[error("group labels are required by this splitter")]
    MissingGroups,

    #[error("unknown target type: {0}")]
    UnknownTargetType(String),

    #[error("model error: {0}")]
    Model(#[from] GbdtError),
}

/// Result type for validation operations
pub type Result<T> = std::result::Result<T, ValidationError>;
