//! TOML experiment configuration
//!
//! ```toml
//! logging_directory = "output/exp1"
//! train_path = "data/train.csv"
//! test_path = "data/test.csv"
//! target_column = "target"
//! gbdt_type = "lgbm"
//!
//! [model_params]
//! n_estimators = 200
//!
//! [cv]
//! n_splits = 5
//! ```
//!
//! Relative data paths are resolved against the directory of the config file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use foldboost_experiment::TrackingOptions;
use foldboost_gbdt::{Backend, FitParams, ModelParams};
use foldboost_validation::{CvSplitter, GroupKFold, KFold, StratifiedKFold, DEFAULT_N_SPLITS};

const TARGET_TYPES: [&str; 3] = ["auto", "binary", "continuous"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    pub logging_directory: PathBuf,
    pub train_path: PathBuf,
    #[serde(default)]
    pub test_path: Option<PathBuf>,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    pub target_column: String,
    #[serde(default = "default_gbdt_type")]
    pub gbdt_type: String,
    #[serde(default = "default_type_of_target")]
    pub type_of_target: String,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_submission_filename")]
    pub submission_filename: String,
    #[serde(default)]
    pub categorical_feature: Option<Vec<String>>,
    /// Object columns cast to `category` after loading
    #[serde(default)]
    pub category_columns: Vec<String>,
    #[serde(default)]
    pub model_params: ModelParams,
    #[serde(default)]
    pub fit_params: FitParams,
    #[serde(default)]
    pub cv: CvConfig,
    #[serde(default)]
    pub tracking: Option<TrackingOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CvConfig {
    pub n_splits: usize,
    pub stratified: bool,
    /// Unset means shuffled row folds; group folds never shuffle
    pub shuffle: Option<bool>,
    pub seed: u64,
    /// Training column holding group labels; switches to group folds
    pub group_column: Option<String>,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            n_splits: DEFAULT_N_SPLITS,
            stratified: false,
            shuffle: None,
            seed: 0,
            group_column: None,
        }
    }
}

impl CvConfig {
    pub fn splitter(&self) -> Box<dyn CvSplitter> {
        let shuffle = self.shuffle.unwrap_or(true);
        if self.group_column.is_some() {
            Box::new(GroupKFold::new(self.n_splits))
        } else if self.stratified {
            Box::new(StratifiedKFold::new(self.n_splits, shuffle, self.seed))
        } else {
            Box::new(KFold::new(self.n_splits, shuffle, self.seed))
        }
    }
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_gbdt_type() -> String {
    Backend::Lgbm.tag().to_string()
}

fn default_type_of_target() -> String {
    "auto".to_string()
}

fn default_submission_filename() -> String {
    "submission.csv".to_string()
}

impl ExperimentConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: ExperimentConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.train_path = resolve(base, &config.train_path);
            config.test_path = config.test_path.map(|p| resolve(base, &p));
        }

        info!("Loaded experiment config from {}", path.display());
        Ok(config)
    }

    /// Reject unusable settings and return warnings for questionable ones.
    pub fn validate(&self) -> Result<Vec<String>> {
        if self.gbdt_type.parse::<Backend>().is_err() {
            bail!("gbdt_type must be 'lgbm' or 'cat', got '{}'", self.gbdt_type);
        }
        if !TARGET_TYPES.contains(&self.type_of_target.as_str()) {
            bail!(
                "type_of_target must be one of {:?}, got '{}'",
                TARGET_TYPES,
                self.type_of_target
            );
        }
        if self.cv.n_splits < 2 {
            bail!("cv.n_splits must be at least 2, got {}", self.cv.n_splits);
        }
        if self.target_column == self.id_column {
            bail!("target_column and id_column are both '{}'", self.id_column);
        }

        let mut warnings = Vec::new();
        if self.cv.group_column.is_some() && self.cv.stratified {
            warnings.push("cv.stratified is ignored when cv.group_column is set".to_string());
        }
        if self.cv.group_column.is_some() && self.cv.shuffle == Some(true) {
            warnings.push("group folds are not shuffled".to_string());
        }
        if self.test_path.is_none() && self.submission_filename != default_submission_filename() {
            warnings.push("submission_filename has no effect without test_path".to_string());
        }
        if let (Some(explicit), false) = (&self.categorical_feature, self.category_columns.is_empty()) {
            for column in &self.category_columns {
                if !explicit.contains(column) {
                    warnings.push(format!(
                        "category column '{}' is not in categorical_feature",
                        column
                    ));
                }
            }
        }

        if !warnings.is_empty() {
            warn!("Configuration validation warnings: {:?}", warnings);
        }
        Ok(warnings)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
