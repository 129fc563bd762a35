//! Leaf-wise histogram gradient boosting (`lgbm` backend)

pub mod booster;
pub mod grower;
pub mod params;
pub mod tree;

pub use booster::LgbmBooster;
pub use params::LgbmParams;
pub use tree::{Node, Tree};

use tracing::warn;

use crate::dataset::FeatureMatrix;
use crate::errors::{GbdtError, Result};
use crate::estimator::{
    importance_table, resolve_features, Backend, BoosterRef, Estimator, EvalSet,
    FeatureImportance, ModelKind,
};
use crate::params::{FitParams, ModelParams};

/// Fit parameters understood by this backend
pub const FIT_PARAMS: &[&str] = &["categorical_feature", "early_stopping_rounds"];

/// `LGBMClassifier` / `LGBMRegressor`
#[derive(Debug, Clone)]
pub struct LgbmEstimator {
    kind: ModelKind,
    params: LgbmParams,
    booster: Option<LgbmBooster>,
}

impl LgbmEstimator {
    pub fn new(kind: ModelKind, params: &ModelParams) -> Result<Self> {
        if kind.backend() != Backend::Lgbm {
            return Err(GbdtError::InvalidParameters(format!(
                "{} is not an lgbm model",
                kind
            )));
        }
        let params: LgbmParams = params.parse()?;
        params.validate()?;
        Ok(Self {
            kind,
            params,
            booster: None,
        })
    }

    /// Wrap a trained booster, e.g. one loaded from disk.
    pub fn from_booster(kind: ModelKind, booster: LgbmBooster) -> Result<Self> {
        if kind.objective() != booster.objective || kind.backend() != Backend::Lgbm {
            return Err(GbdtError::InvalidModel(format!(
                "{} cannot hold a {} booster",
                kind,
                booster.objective.name()
            )));
        }
        Ok(Self {
            kind,
            params: booster.params.clone(),
            booster: Some(booster),
        })
    }

    pub fn params(&self) -> &LgbmParams {
        &self.params
    }

    fn fitted(&self) -> Result<&LgbmBooster> {
        self.booster.as_ref().ok_or(GbdtError::NotFitted)
    }
}

impl Estimator for LgbmEstimator {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn fit(
        &mut self,
        x: &FeatureMatrix,
        y: &[f64],
        eval_set: Option<EvalSet<'_>>,
        fit_params: &FitParams,
    ) -> Result<()> {
        fit_params.ensure_only(FIT_PARAMS)?;
        let names = fit_params
            .string_list("categorical_feature")?
            .unwrap_or_default();
        let categorical = resolve_features(x, &names)?;

        let mut early_stopping = fit_params.usize_value("early_stopping_rounds")?;
        if early_stopping.is_some() && eval_set.is_none() {
            warn!("early_stopping_rounds ignored without an eval set");
            early_stopping = None;
        }

        let booster = LgbmBooster::train(
            &self.params,
            self.kind.objective(),
            x,
            y,
            &categorical,
            eval_set,
            early_stopping,
        )?;
        self.booster = Some(booster);
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        self.fitted()?.predict(x)
    }

    fn feature_importance(&self) -> Result<Vec<FeatureImportance>> {
        let booster = self.fitted()?;
        Ok(importance_table(
            &booster.feature_names,
            &booster.feature_importance(),
        ))
    }

    fn booster(&self) -> Option<BoosterRef<'_>> {
        self.booster.as_ref().map(BoosterRef::Lgbm)
    }

    fn best_iteration(&self) -> Option<usize> {
        self.booster.as_ref().and_then(|b| b.best_iteration)
    }
}
