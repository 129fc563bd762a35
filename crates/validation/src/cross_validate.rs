//! Fold-wise training with out-of-fold and averaged test predictions

use foldboost_gbdt::{Estimator, EvalSet, FeatureImportance, FeatureMatrix, FitParams, Metric};
use tracing::info;

use crate::errors::{Result, ValidationError};
use crate::split::CvSplitter;

/// Sink for per-fold progress messages
pub trait FoldLogger {
    fn log(&self, message: &str);
}

/// Logger that only emits tracing events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl FoldLogger for TracingLogger {
    fn log(&self, message: &str) {
        info!("{}", message);
    }
}

/// Outputs of a cross-validation run
#[derive(Debug, Clone, PartialEq)]
pub struct CvResult {
    /// One prediction per training row from the fold that held it out
    pub oof_prediction: Vec<f64>,
    /// Mean of the fold models' test predictions
    pub test_prediction: Option<Vec<f64>>,
    /// Per-fold scores followed by the overall score; empty without a metric
    pub scores: Vec<f64>,
    /// Importance table of each fold model
    pub importance: Vec<Vec<FeatureImportance>>,
}

/// Train `models[i]` on the training rows of fold `i`.
///
/// Validation rows are passed as the eval set, predicted into the
/// out-of-fold vector and scored with `eval` when one is given.
#[allow(clippy::too_many_arguments)]
pub fn cross_validate(
    models: &mut [Box<dyn Estimator>],
    x_train: &FeatureMatrix,
    y: &[f64],
    x_test: Option<&FeatureMatrix>,
    cv: &dyn CvSplitter,
    groups: Option<&[String]>,
    logger: &dyn FoldLogger,
    eval: Option<&Metric>,
    fit_params: &FitParams,
) -> Result<CvResult> {
    let n_rows = x_train.n_rows();
    if y.len() != n_rows {
        return Err(ValidationError::LengthMismatch {
            what: "target".into(),
            expected: n_rows,
            got: y.len(),
        });
    }
    if models.len() != cv.n_splits() {
        return Err(ValidationError::FoldCountMismatch {
            models: models.len(),
            folds: cv.n_splits(),
        });
    }

    let folds = cv.split(n_rows, y, groups)?;
    if folds.len() != models.len() {
        return Err(ValidationError::FoldCountMismatch {
            models: models.len(),
            folds: folds.len(),
        });
    }

    let n_folds = folds.len() as f64;
    let mut oof_prediction = vec![0.0; n_rows];
    let mut test_sum = x_test.map(|x| vec![0.0; x.n_rows()]);
    let mut scores = Vec::with_capacity(folds.len() + 1);
    let mut importance = Vec::with_capacity(folds.len());

    for (n, (model, fold)) in models.iter_mut().zip(&folds).enumerate() {
        let x_tr = x_train.take_rows(&fold.train);
        let y_tr: Vec<f64> = fold.train.iter().map(|&r| y[r]).collect();
        let x_va = x_train.take_rows(&fold.valid);
        let y_va: Vec<f64> = fold.valid.iter().map(|&r| y[r]).collect();

        model.fit(
            &x_tr,
            &y_tr,
            Some(EvalSet { x: &x_va, y: &y_va }),
            fit_params,
        )?;

        let valid_pred = model.predict(&x_va)?;
        for (&row, &p) in fold.valid.iter().zip(&valid_pred) {
            oof_prediction[row] = p;
        }

        if let (Some(x_te), Some(sum)) = (x_test, test_sum.as_mut()) {
            for (acc, p) in sum.iter_mut().zip(model.predict(x_te)?) {
                *acc += p / n_folds;
            }
        }

        if let Some(metric) = eval {
            let score = metric.score(&y_va, &valid_pred);
            scores.push(score);
            logger.log(&format!("Fold {} score: {}", n + 1, score));
        }

        importance.push(model.feature_importance()?);
    }

    if let Some(metric) = eval {
        let overall = metric.score(y, &oof_prediction);
        scores.push(overall);
        logger.log(&format!("Overall score: {}", overall));
    }

    Ok(CvResult {
        oof_prediction,
        test_prediction: test_sum,
        scores,
        importance,
    })
}
