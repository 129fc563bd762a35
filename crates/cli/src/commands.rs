//! Subcommand implementations

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

use foldboost_experiment::{run_experiment_gbdt, GbdtExperiment, GbdtResult};
use foldboost_frame::{DataFrame, Series};
use foldboost_gbdt::{Backend, CatBooster, LgbmBooster};
use foldboost_validation::CvStrategy;

use crate::config::ExperimentConfig;

/// Load the configured CSVs and run the experiment.
pub fn run(config: &ExperimentConfig, overwrite: bool) -> Result<GbdtResult> {
    info!("Loading training data from {}", config.train_path.display());
    let mut x_train = DataFrame::read_csv(&config.train_path)
        .with_context(|| format!("Failed to load {}", config.train_path.display()))?;

    let target = x_train
        .pop(&config.target_column)
        .with_context(|| format!("Training data has no column '{}'", config.target_column))?;
    let y = Series::from_column(&target)
        .with_context(|| format!("Target column '{}' is not numeric", config.target_column))?;

    let groups = match &config.cv.group_column {
        Some(column) => Some(
            x_train
                .pop(column)
                .with_context(|| format!("Training data has no group column '{}'", column))?
                .to_labels(),
        ),
        None => None,
    };

    let mut x_test = match &config.test_path {
        Some(path) => {
            info!("Loading test data from {}", path.display());
            let mut df = DataFrame::read_csv(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            for column in [Some(&config.target_column), config.cv.group_column.as_ref()]
                .into_iter()
                .flatten()
            {
                if df.contains(column) {
                    df.pop(column)?;
                }
            }
            Some(df)
        }
        None => None,
    };

    for column in &config.category_columns {
        x_train
            .astype_category(column)
            .with_context(|| format!("Cannot cast '{}' to category", column))?;
        if let Some(df) = x_test.as_mut() {
            df.astype_category(column)
                .with_context(|| format!("Cannot cast test column '{}' to category", column))?;
        }
    }

    info!(
        "Loaded {} training rows, {} features",
        x_train.n_rows(),
        x_train.n_columns()
    );

    let mut experiment = GbdtExperiment::new(&config.logging_directory, x_train, y);
    experiment.model_params = config.model_params.clone();
    experiment.id_column = config.id_column.clone();
    experiment.x_test = x_test;
    experiment.gbdt_type = config.gbdt_type.clone();
    experiment.fit_params = config.fit_params.clone();
    experiment.cv = CvStrategy::Splitter(config.cv.splitter());
    experiment.groups = groups;
    experiment.overwrite = config.overwrite || overwrite;
    experiment.categorical_feature = config.categorical_feature.clone();
    experiment.submission_filename = config.submission_filename.clone();
    experiment.type_of_target = config.type_of_target.clone();
    experiment.tracking = config.tracking.clone();

    let result = run_experiment_gbdt(experiment).context("Experiment failed")?;
    info!("Finished in {:.3}s", result.time.as_secs_f64());
    Ok(result)
}

/// Facts about a saved fold model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub backend: Backend,
    pub objective: String,
    pub num_trees: usize,
    pub best_iteration: Option<usize>,
    pub feature_names: Vec<String>,
    pub digest: String,
}

/// Load a saved model and summarize it.
pub fn show_model(backend: &str, path: &Path) -> Result<ModelSummary> {
    let backend: Backend = backend.parse()?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read model {}", path.display()))?;
    if bytes.is_empty() {
        bail!("Model file {} is empty", path.display());
    }
    let digest = hex::encode(blake3::hash(&bytes).as_bytes());

    let summary = match backend {
        Backend::Lgbm => {
            let booster = LgbmBooster::load_model(path)
                .with_context(|| format!("Failed to load lgbm model {}", path.display()))?;
            ModelSummary {
                backend,
                objective: booster.objective.name().to_string(),
                num_trees: booster.num_trees(),
                best_iteration: booster.best_iteration,
                feature_names: booster.feature_names,
                digest,
            }
        }
        Backend::Cat => {
            let booster = CatBooster::load_model(path)
                .with_context(|| format!("Failed to load cat model {}", path.display()))?;
            ModelSummary {
                backend,
                objective: booster.objective.name().to_string(),
                num_trees: booster.num_trees(),
                best_iteration: booster.best_iteration,
                feature_names: booster.feature_names,
                digest,
            }
        }
    };
    Ok(summary)
}
