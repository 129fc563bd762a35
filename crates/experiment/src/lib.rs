//! foldboost experiment - logged k-fold GBDT runs
//!
//! - `experiment`: a locked logging directory with log, metrics and artifacts
//! - `tracking`: optional local run store in a file-store layout
//! - `importance`: fold importance aggregation and bar chart
//! - `gbdt`: backend/metric dispatch, `run_experiment_gbdt` and `save_model`

pub mod errors;
pub mod experiment;
pub mod gbdt;
pub mod importance;
pub mod tracking;

pub use errors::{ExperimentError, Result};
pub use experiment::{DataFormat, Experiment, ExperimentLogger, ExperimentOptions};
pub use gbdt::{
    categorical_columns, dispatch_gbdt, run_experiment_gbdt, save_model, DispatchEntry,
    GbdtExperiment, GbdtResult,
};
pub use importance::{aggregate_importance, plot_importance};
pub use tracking::{RunMeta, RunStatus, TrackingOptions, TrackingRun};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
