//! foldboost gbdt - deterministic gradient boosting backends
//!
//! Two model families behind one `Estimator` trait:
//!
//! - `lgbm`: leaf-wise histogram trees with learned missing-value direction
//!   and categorical partitions
//! - `catboost`: symmetric trees over ordered target statistics
//!
//! Identical inputs and seeds produce identical models. `lgbm` models are
//! stored as canonical JSON, `cat` models as bincode.

pub mod binning;
pub mod catboost;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod estimator;
pub mod lgbm;
pub mod metrics;
pub mod objective;
pub mod params;
pub mod serde_canon;
pub mod training;

pub use catboost::{CatBoostEstimator, CatBoostParams, CatBooster};
pub use dataset::FeatureMatrix;
pub use errors::{GbdtError, Result};
pub use estimator::{
    Backend, BoosterRef, Estimator, EvalSet, FeatureImportance, ModelKind, Task,
};
pub use lgbm::{LgbmBooster, LgbmEstimator, LgbmParams};
pub use metrics::{
    log_loss, mean_absolute_error, mean_squared_error, roc_auc_score, root_mean_squared_error,
    Metric,
};
pub use objective::Objective;
pub use params::{FitParams, ModelParams, Params};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
