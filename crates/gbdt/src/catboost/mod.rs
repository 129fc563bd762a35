//! Oblivious-tree boosting with ordered target statistics (`cat` backend)

pub mod booster;
pub mod ctr;
pub mod oblivious;
pub mod params;

pub use booster::CatBooster;
pub use ctr::CtrTable;
pub use oblivious::{ObliviousSplit, ObliviousTree};
pub use params::CatBoostParams;

use tracing::warn;

use crate::dataset::FeatureMatrix;
use crate::errors::{GbdtError, Result};
use crate::estimator::{
    importance_table, resolve_features, Backend, BoosterRef, Estimator, EvalSet,
    FeatureImportance, ModelKind,
};
use crate::params::{FitParams, ModelParams};

/// Fit parameters understood by this backend
pub const FIT_PARAMS: &[&str] = &["cat_features", "early_stopping_rounds"];

/// `CatBoostClassifier` / `CatBoostRegressor`
#[derive(Debug, Clone)]
pub struct CatBoostEstimator {
    kind: ModelKind,
    params: CatBoostParams,
    booster: Option<CatBooster>,
}

impl CatBoostEstimator {
    pub fn new(kind: ModelKind, params: &ModelParams) -> Result<Self> {
        if kind.backend() != Backend::Cat {
            return Err(GbdtError::InvalidParameters(format!(
                "{} is not a cat model",
                kind
            )));
        }
        let params: CatBoostParams = params.parse()?;
        params.validate()?;
        Ok(Self {
            kind,
            params,
            booster: None,
        })
    }

    pub fn from_booster(kind: ModelKind, booster: CatBooster) -> Result<Self> {
        if kind.objective() != booster.objective || kind.backend() != Backend::Cat {
            return Err(GbdtError::InvalidModel(format!(
                "{} cannot hold a {} booster",
                kind,
                booster.objective.name()
            )));
        }
        Ok(Self {
            kind,
            params: CatBoostParams {
                learning_rate: booster.learning_rate,
                depth: booster.depth,
                iterations: booster.num_trees(),
                ..CatBoostParams::default()
            },
            booster: Some(booster),
        })
    }

    pub fn params(&self) -> &CatBoostParams {
        &self.params
    }

    fn fitted(&self) -> Result<&CatBooster> {
        self.booster.as_ref().ok_or(GbdtError::NotFitted)
    }
}

impl Estimator for CatBoostEstimator {
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
        let names = fit_params.string_list("cat_features")?.unwrap_or_default();
        let cat_features = resolve_features(x, &names)?;

        let mut early_stopping = fit_params.usize_value("early_stopping_rounds")?;
        if early_stopping.is_some() && eval_set.is_none() {
            warn!("early_stopping_rounds ignored without an eval set");
            early_stopping = None;
        }

        self.booster = Some(CatBooster::train(
            &self.params,
            self.kind.objective(),
            x,
            y,
            &cat_features,
            eval_set,
            early_stopping,
        )?);
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
        self.booster.as_ref().map(BoosterRef::Cat)
    }

    fn best_iteration(&self) -> Option<usize> {
        self.booster.as_ref().and_then(|b| b.best_iteration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> (FeatureMatrix, Vec<f64>) {
        let a: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let c: Vec<f64> = (0..40).map(|i| (i % 2) as f64).collect();
        let y: Vec<f64> = (0..40).map(|i| (i % 2) as f64 * 3.0 + i as f64 * 0.1).collect();
        let x = FeatureMatrix::new(vec!["a".into(), "c".into()], vec![a, c]).unwrap();
        (x, y)
    }

    #[test]
    fn test_cat_features_fit_param() {
        let (x, y) = data();
        let params = ModelParams::new().with("iterations", 10).with("depth", 2);
        let mut model = CatBoostEstimator::new(ModelKind::CatBoostRegressor, &params).unwrap();
        model
            .fit(&x, &y, None, &FitParams::new().with("cat_features", json!(["c"])))
            .unwrap();

        match model.booster() {
            Some(BoosterRef::Cat(b)) => assert_eq!(b.cat_features, vec![1]),
            other => panic!("unexpected booster {:?}", other),
        }
        assert_eq!(model.predict(&x).unwrap().len(), 40);
    }

    #[test]
    fn test_rejects_lgbm_fit_params() {
        let (x, y) = data();
        let mut model =
            CatBoostEstimator::new(ModelKind::CatBoostRegressor, &ModelParams::new()).unwrap();
        let fit_params = FitParams::new().with("categorical_feature", json!(["c"]));
        assert!(matches!(
            model.fit(&x, &y, None, &fit_params),
            Err(GbdtError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_early_stopping_with_eval_set() {
        let (x, y) = data();
        let params = ModelParams::new().with("iterations", 200).with("depth", 2);
        let mut model = CatBoostEstimator::new(ModelKind::CatBoostRegressor, &params).unwrap();
        let eval = EvalSet { x: &x, y: &y };
        model
            .fit(&x, &y, Some(eval), &FitParams::new().with("early_stopping_rounds", 5))
            .unwrap();
        assert!(model.best_iteration().is_some());
    }

    #[test]
    fn test_unfitted_predict_fails() {
        let model =
            CatBoostEstimator::new(ModelKind::CatBoostClassifier, &ModelParams::new()).unwrap();
        let (x, _) = data();
        assert!(matches!(model.predict(&x), Err(GbdtError::NotFitted)));
    }
}
