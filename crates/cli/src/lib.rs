//! foldboost cli - TOML-configured experiment runs
//!
//! The `foldboost` binary is a thin layer over `config` and `commands`.

pub mod commands;
pub mod config;

pub use commands::{run, show_model, ModelSummary};
pub use config::{CvConfig, ExperimentConfig};
