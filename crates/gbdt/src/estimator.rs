//! Estimator interface shared by both backends
//!
//! `ModelKind` plays the role of a model class: it names the estimator and
//! builds fresh, unfitted instances from constructor parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catboost::{CatBoostEstimator, CatBooster};
use crate::dataset::FeatureMatrix;
use crate::errors::{GbdtError, Result};
use crate::lgbm::{LgbmBooster, LgbmEstimator};
use crate::objective::Objective;
use crate::params::{FitParams, ModelParams};

/// Boosting library family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Lgbm,
    Cat,
}

impl Backend {
    pub fn tag(&self) -> &'static str {
        match self {
            Backend::Lgbm => "lgbm",
            Backend::Cat => "cat",
        }
    }
}

impl FromStr for Backend {
    type Err = GbdtError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lgbm" => Ok(Backend::Lgbm),
            "cat" => Ok(Backend::Cat),
            other => Err(GbdtError::InvalidParameters(format!(
                "unknown backend '{}', expected 'lgbm' or 'cat'",
                other
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Classification,
    Regression,
}

/// Model constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    LgbmClassifier,
    LgbmRegressor,
    CatBoostClassifier,
    CatBoostRegressor,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::LgbmClassifier => "LGBMClassifier",
            ModelKind::LgbmRegressor => "LGBMRegressor",
            ModelKind::CatBoostClassifier => "CatBoostClassifier",
            ModelKind::CatBoostRegressor => "CatBoostRegressor",
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            ModelKind::LgbmClassifier | ModelKind::LgbmRegressor => Backend::Lgbm,
            ModelKind::CatBoostClassifier | ModelKind::CatBoostRegressor => Backend::Cat,
        }
    }

    pub fn task(&self) -> Task {
        match self {
            ModelKind::LgbmClassifier | ModelKind::CatBoostClassifier => Task::Classification,
            ModelKind::LgbmRegressor | ModelKind::CatBoostRegressor => Task::Regression,
        }
    }

    pub fn objective(&self) -> Objective {
        match self.task() {
            Task::Classification => Objective::Binary,
            Task::Regression => Objective::Regression,
        }
    }

    /// Construct an unfitted estimator; unknown parameter names are rejected.
    pub fn build(&self, params: &ModelParams) -> Result<Box<dyn Estimator>> {
        match self.backend() {
            Backend::Lgbm => Ok(Box::new(LgbmEstimator::new(*self, params)?)),
            Backend::Cat => Ok(Box::new(CatBoostEstimator::new(*self, params)?)),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validation data monitored during training
#[derive(Debug, Clone, Copy)]
pub struct EvalSet<'a> {
    pub x: &'a FeatureMatrix,
    pub y: &'a [f64],
}

/// One row of a feature importance table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Typed view of a trained booster
#[derive(Debug, Clone, Copy)]
pub enum BoosterRef<'a> {
    Lgbm(&'a LgbmBooster),
    Cat(&'a CatBooster),
}

impl BoosterRef<'_> {
    pub fn backend(&self) -> Backend {
        match self {
            BoosterRef::Lgbm(_) => Backend::Lgbm,
            BoosterRef::Cat(_) => Backend::Cat,
        }
    }
}

/// A gradient boosting model that can be fitted once and then queried
pub trait Estimator: fmt::Debug + Send {
    fn kind(&self) -> ModelKind;

    fn fit(
        &mut self,
        x: &FeatureMatrix,
        y: &[f64],
        eval_set: Option<EvalSet<'_>>,
        fit_params: &FitParams,
    ) -> Result<()>;

    /// Positive-class probability for classifiers, raw value for regressors.
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>>;

    /// Total split gain per feature, in feature order.
    fn feature_importance(&self) -> Result<Vec<FeatureImportance>>;

    fn booster(&self) -> Option<BoosterRef<'_>>;

    fn best_iteration(&self) -> Option<usize>;
}

/// Resolve categorical feature names against a matrix.
pub(crate) fn resolve_features(x: &FeatureMatrix, names: &[String]) -> Result<Vec<usize>> {
    let mut indices = Vec::with_capacity(names.len());
    for name in names {
        let idx = x
            .feature_index(name)
            .ok_or_else(|| GbdtError::UnknownFeature(name.clone()))?;
        if !indices.contains(&idx) {
            indices.push(idx);
        }
    }
    indices.sort_unstable();
    Ok(indices)
}

/// Sum gains per feature index into a named table.
pub(crate) fn importance_table(names: &[String], gains: &[f64]) -> Vec<FeatureImportance> {
    names
        .iter()
        .zip(gains)
        .map(|(name, &gain)| FeatureImportance {
            feature: name.clone(),
            importance: gain,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_tags() {
        assert_eq!("lgbm".parse::<Backend>().unwrap(), Backend::Lgbm);
        assert_eq!("cat".parse::<Backend>().unwrap(), Backend::Cat);
        assert!("xgb".parse::<Backend>().is_err());
        assert_eq!(Backend::Cat.to_string(), "cat");
    }

    #[test]
    fn test_model_kind_families() {
        assert_eq!(ModelKind::LgbmClassifier.backend(), Backend::Lgbm);
        assert_eq!(ModelKind::CatBoostRegressor.backend(), Backend::Cat);
        assert_eq!(ModelKind::CatBoostClassifier.objective(), Objective::Binary);
        assert_eq!(ModelKind::LgbmRegressor.task(), Task::Regression);
    }

    #[test]
    fn test_build_rejects_unknown_params() {
        let params = ModelParams::new().with("not_a_param", 1);
        for kind in [ModelKind::LgbmClassifier, ModelKind::CatBoostRegressor] {
            assert!(matches!(
                kind.build(&params),
                Err(GbdtError::InvalidParameters(_))
            ));
        }
    }

    #[test]
    fn test_built_model_is_unfitted() {
        let model = ModelKind::LgbmRegressor.build(&ModelParams::new()).unwrap();
        assert_eq!(model.kind(), ModelKind::LgbmRegressor);
        assert!(model.booster().is_none());
        assert!(matches!(model.feature_importance(), Err(GbdtError::NotFitted)));
    }

    #[test]
    fn test_resolve_features() {
        let x = FeatureMatrix::new(
            vec!["a".into(), "b".into()],
            vec![vec![0.0], vec![1.0]],
        )
        .unwrap();
        assert_eq!(resolve_features(&x, &["b".into(), "a".into()]).unwrap(), vec![0, 1]);
        assert!(matches!(
            resolve_features(&x, &["c".into()]),
            Err(GbdtError::UnknownFeature(_))
        ));
    }
}
