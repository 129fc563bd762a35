//! k-fold GBDT experiment runner
//!
//! `run_experiment_gbdt` takes a configured `GbdtExperiment`, trains one model
//! per fold and leaves the following under the logging directory:
//!
//! ```text
//! log.txt  scores.txt  params.json  importance.png
//! oof_prediction.npy  test_prediction.npy  submission.csv
//! models/fold1 .. models/foldN
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::info;

use foldboost_frame::{Column, DataFrame, Series};
use foldboost_gbdt::{
    Backend, BoosterRef, Estimator, FeatureImportance, FeatureMatrix, FitParams, Metric,
    ModelKind, ModelParams,
};
use foldboost_validation::{check_cv, cross_validate, type_of_target, CvStrategy};

use crate::errors::{ExperimentError, Result};
use crate::experiment::{DataFormat, Experiment, ExperimentOptions};
use crate::importance::{aggregate_importance, plot_importance};
use crate::tracking::TrackingOptions;

pub const SCORES_FILENAME: &str = "scores.txt";
pub const DEFAULT_SUBMISSION_FILENAME: &str = "submission.csv";
pub const AUTO_TARGET_TYPE: &str = "auto";
const MAX_PLOTTED_FEATURES: usize = 50;

/// One row of the backend/metric table
#[derive(Debug, Clone)]
pub struct DispatchEntry {
    pub target_type: &'static str,
    pub gbdt_type: &'static str,
    pub model: ModelKind,
    pub eval: Metric,
    pub cat_param: &'static str,
}

const DISPATCH_TABLE: [(&str, &str, ModelKind, &str); 4] = [
    ("binary", "lgbm", ModelKind::LgbmClassifier, "categorical_feature"),
    ("continuous", "lgbm", ModelKind::LgbmRegressor, "categorical_feature"),
    ("binary", "cat", ModelKind::CatBoostClassifier, "cat_features"),
    ("continuous", "cat", ModelKind::CatBoostRegressor, "cat_features"),
];

/// Look up the model constructor, default metric and categorical parameter.
///
/// `custom_eval` replaces the table's metric and nothing else.
pub fn dispatch_gbdt(
    gbdt_type: &str,
    target_type: &str,
    custom_eval: Option<Metric>,
) -> Result<DispatchEntry> {
    let (target, backend, model, cat_param) = DISPATCH_TABLE
        .iter()
        .copied()
        .find(|(t, g, _, _)| *t == target_type && *g == gbdt_type)
        .ok_or_else(|| ExperimentError::UnsupportedConfiguration {
            gbdt_type: gbdt_type.to_string(),
            target_type: target_type.to_string(),
        })?;

    let eval = custom_eval.unwrap_or_else(|| match target {
        "binary" => Metric::roc_auc(),
        _ => Metric::mean_squared_error(),
    });

    Ok(DispatchEntry {
        target_type: target,
        gbdt_type: backend,
        model,
        eval,
        cat_param,
    })
}

/// Inputs of one run
#[derive(Debug)]
pub struct GbdtExperiment {
    pub logging_directory: PathBuf,
    pub model_params: ModelParams,
    pub id_column: String,
    pub x_train: DataFrame,
    pub y: Series,
    pub x_test: Option<DataFrame>,
    pub eval_func: Option<Metric>,
    pub gbdt_type: String,
    pub fit_params: FitParams,
    pub cv: CvStrategy,
    pub groups: Option<Vec<String>>,
    pub overwrite: bool,
    pub categorical_feature: Option<Vec<String>>,
    pub submission_filename: String,
    pub type_of_target: String,
    pub tracking: Option<TrackingOptions>,
}

impl GbdtExperiment {
    pub fn new(logging_directory: impl Into<PathBuf>, x_train: DataFrame, y: Series) -> Self {
        Self {
            logging_directory: logging_directory.into(),
            model_params: ModelParams::new(),
            id_column: "id".to_string(),
            x_train,
            y,
            x_test: None,
            eval_func: None,
            gbdt_type: Backend::Lgbm.tag().to_string(),
            fit_params: FitParams::new(),
            cv: CvStrategy::Default,
            groups: None,
            overwrite: false,
            categorical_feature: None,
            submission_filename: DEFAULT_SUBMISSION_FILENAME.to_string(),
            type_of_target: AUTO_TARGET_TYPE.to_string(),
            tracking: None,
        }
    }
}

/// Outputs of a run
#[derive(Debug)]
pub struct GbdtResult {
    pub oof_prediction: Vec<f64>,
    pub test_prediction: Option<Vec<f64>>,
    /// `Fold 1 .. Fold N` followed by `Overall`
    pub scores: Vec<f64>,
    pub models: Vec<Box<dyn Estimator>>,
    pub importance: Vec<FeatureImportance>,
    pub time: Duration,
}

/// Train one model per fold and log everything to the logging directory.
pub fn run_experiment_gbdt(config: GbdtExperiment) -> Result<GbdtResult> {
    let start = Instant::now();
    let GbdtExperiment {
        logging_directory,
        model_params,
        id_column,
        mut x_train,
        y,
        mut x_test,
        eval_func,
        gbdt_type,
        mut fit_params,
        cv,
        groups,
        overwrite,
        categorical_feature,
        submission_filename,
        type_of_target: target_selector,
        tracking,
    } = config;

    let cv = check_cv(cv, y.values(), false, 0)?;

    if x_train.contains(&id_column) {
        if let Some(test) = x_test.as_mut() {
            check_same_columns(&x_train, test)?;
            test.set_index(&id_column)?;
        }
        x_train.set_index(&id_column)?;
    }
    if x_train.index_name() != Some(id_column.as_str()) {
        return Err(ExperimentError::IndexMismatch {
            expected: id_column,
            found: x_train.index_name().map(str::to_string),
        });
    }
    if let Some(test) = x_test.as_ref() {
        check_same_columns(&x_train, test)?;
    }

    let experiment = Experiment::open(
        &logging_directory,
        ExperimentOptions {
            overwrite,
            metrics_filename: SCORES_FILENAME.to_string(),
            tracking,
        },
    )?;

    experiment.log(&format!("GBDT: {}", gbdt_type));
    experiment.log(&format!("Experiment: {}", logging_directory.display()));
    experiment.log(&format!("Params: {}", model_params));
    experiment.log(&format!("Features: {:?}", x_train.column_names()));
    experiment.log_params(model_params.as_map())?;

    let categorical = categorical_feature.unwrap_or_else(|| categorical_columns(&x_train));
    experiment.log(&format!("Categorical: {:?}", categorical));

    let target_type = if target_selector == AUTO_TARGET_TYPE {
        type_of_target(y.values()).as_str().to_string()
    } else {
        target_selector
    };
    let entry = dispatch_gbdt(&gbdt_type, &target_type, eval_func)?;
    let backend = Backend::from_str(entry.gbdt_type)?;
    info!(
        "{} target, {} x {} folds, eval {}",
        entry.target_type,
        entry.model,
        cv.n_splits(),
        entry.eval.name()
    );

    let mut models = (0..cv.n_splits())
        .map(|_| entry.model.build(&model_params))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if !fit_params.contains(entry.cat_param) {
        fit_params.insert(entry.cat_param, categorical.clone());
    }

    let (train_matrix, test_matrix) = FeatureMatrix::from_frames(&x_train, x_test.as_ref())?;
    let cv_result = cross_validate(
        &mut models,
        &train_matrix,
        y.values(),
        test_matrix.as_ref(),
        cv.as_ref(),
        groups.as_deref(),
        &experiment.logger(),
        Some(&entry.eval),
        &fit_params,
    )?;

    let (overall, per_fold) = match cv_result.scores.split_last() {
        Some((overall, per_fold)) => (Some(*overall), per_fold),
        None => (None, &cv_result.scores[..]),
    };
    for (i, score) in per_fold.iter().enumerate() {
        experiment.log_metric(&format!("Fold {}", i + 1), *score)?;
    }
    if let Some(overall) = overall {
        experiment.log_metric("Overall", overall)?;
    }

    let importance = aggregate_importance(&cv_result.importance);
    let plot_path = logging_directory.join("importance.png");
    plot_importance(&importance, &plot_path, MAX_PLOTTED_FEATURES)?;
    experiment.log_artifact(&plot_path)?;

    for (i, model) in models.iter().enumerate() {
        let path = save_model(backend, model.as_ref(), &logging_directory, i + 1)?;
        experiment.log_artifact(&path)?;
    }

    experiment.log_numpy("oof_prediction", &cv_result.oof_prediction)?;
    if let (Some(test), Some(prediction)) = (x_test.as_ref(), cv_result.test_prediction.as_ref()) {
        experiment.log_numpy("test_prediction", prediction)?;
        let submission = submission_frame(test, &id_column, y.name(), prediction)?;
        experiment.log_dataframe(&submission_filename, &submission, DataFormat::Csv)?;
    }

    let time = start.elapsed();
    experiment.log(&format!("Elapsed: {:.3}s", time.as_secs_f64()));
    experiment.finish()?;

    Ok(GbdtResult {
        oof_prediction: cv_result.oof_prediction,
        test_prediction: cv_result.test_prediction,
        scores: cv_result.scores,
        models,
        importance,
        time,
    })
}

/// Write a trained fold model to `<dir>/models/fold<fold>`.
pub fn save_model(
    gbdt_type: Backend,
    model: &dyn Estimator,
    logging_directory: &Path,
    fold: usize,
) -> Result<PathBuf> {
    let booster = model.booster().ok_or(ExperimentError::NotFitted)?;
    if booster.backend() != gbdt_type {
        return Err(ExperimentError::BackendMismatch {
            expected: gbdt_type,
            actual: booster.backend(),
        });
    }

    let models_dir = logging_directory.join("models");
    fs::create_dir_all(&models_dir)?;
    let path = models_dir.join(format!("fold{}", fold));

    let digest = match booster {
        BoosterRef::Lgbm(b) => b.save_model(&path)?,
        BoosterRef::Cat(b) => b.save_model(&path)?,
    };
    info!("saved {} model {} (blake3 {})", gbdt_type, path.display(), digest);
    Ok(path)
}

/// `object` and `category` columns in frame order.
pub fn categorical_columns(df: &DataFrame) -> Vec<String> {
    df.dtypes()
        .into_iter()
        .filter(|(_, dtype)| dtype.is_categorical())
        .map(|(name, _)| name)
        .collect()
}

fn check_same_columns(train: &DataFrame, test: &DataFrame) -> Result<()> {
    let (train_cols, test_cols) = (train.column_names(), test.column_names());
    if train_cols != test_cols {
        return Err(ExperimentError::ColumnMismatch {
            train: train_cols,
            test: test_cols,
        });
    }
    Ok(())
}

fn submission_frame(
    test: &DataFrame,
    id_column: &str,
    target_name: &str,
    prediction: &[f64],
) -> Result<DataFrame> {
    let ids: Vec<Option<String>> = match test.index() {
        Some(index) => index.labels().iter().cloned().map(Some).collect(),
        None => (0..test.n_rows()).map(|i| Some(i.to_string())).collect(),
    };
    Ok(DataFrame::new(vec![
        Column::object(id_column, ids),
        Column::float(target_name, prediction.to_vec()),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_table() {
        let cases = [
            ("lgbm", "binary", ModelKind::LgbmClassifier, "roc_auc_score", "categorical_feature"),
            ("lgbm", "continuous", ModelKind::LgbmRegressor, "mean_squared_error", "categorical_feature"),
            ("cat", "binary", ModelKind::CatBoostClassifier, "roc_auc_score", "cat_features"),
            ("cat", "continuous", ModelKind::CatBoostRegressor, "mean_squared_error", "cat_features"),
        ];
        for (gbdt, target, model, eval, cat_param) in cases {
            let entry = dispatch_gbdt(gbdt, target, None).unwrap();
            assert_eq!(entry.model, model);
            assert_eq!(entry.eval.name(), eval);
            assert_eq!(entry.cat_param, cat_param);
        }
    }

    #[test]
    fn test_dispatch_rejects_unknown_pairs() {
        for (gbdt, target) in [("xgb", "binary"), ("lgbm", "multiclass"), ("LGBM", "binary"), ("cat", "")] {
            let err = dispatch_gbdt(gbdt, target, None).unwrap_err();
            match err {
                ExperimentError::UnsupportedConfiguration { gbdt_type, target_type } => {
                    assert_eq!(gbdt_type, gbdt);
                    assert_eq!(target_type, target);
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn test_custom_eval_only_replaces_metric() {
        let custom = Metric::new("always_one", |_: &[f64], _: &[f64]| 1.0);
        let entry = dispatch_gbdt("cat", "binary", Some(custom)).unwrap();
        assert_eq!(entry.eval.name(), "always_one");
        assert_eq!(entry.eval.score(&[0.0], &[0.0]), 1.0);
        assert_eq!(entry.model, ModelKind::CatBoostClassifier);
        assert_eq!(entry.cat_param, "cat_features");
    }

    #[test]
    fn test_categorical_columns_in_order() {
        let mut df = DataFrame::new(vec![
            Column::object("city", vec![Some("a"), Some("b")]),
            Column::float("x", vec![1.0, 2.0]),
            Column::object("shop", vec![Some("s"), None]),
            Column::int("n", vec![1, 2]),
            Column::bool("flag", vec![true, false]),
        ])
        .unwrap();
        df.astype_category("shop").unwrap();
        assert_eq!(categorical_columns(&df), vec!["city", "shop"]);
    }

    #[test]
    fn test_submission_uses_index_labels() {
        let df = DataFrame::new(vec![Column::int("id", vec![7, 9]), Column::float("x", vec![0.0, 1.0])])
            .and_then(|mut df| df.set_index("id").map(|_| df))
            .unwrap();
        let sub = submission_frame(&df, "id", "target", &[0.25, 0.75]).unwrap();
        assert_eq!(sub.column_names(), vec!["id", "target"]);
        assert_eq!(sub.column("id").unwrap().to_labels(), vec!["7", "9"]);
    }
}
