//! Leaf-wise booster hyperparameters

use serde::{Deserialize, Serialize};

use crate::errors::{GbdtError, Result};

/// Constructor parameters of `LGBMClassifier` / `LGBMRegressor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LgbmParams {
    #[serde(alias = "num_boost_round", alias = "num_iterations")]
    pub n_estimators: usize,
    #[serde(alias = "eta")]
    pub learning_rate: f64,
    pub num_leaves: usize,
    /// Non-positive means unlimited
    pub max_depth: i64,
    #[serde(alias = "min_data_in_leaf")]
    pub min_child_samples: usize,
    #[serde(alias = "min_sum_hessian_in_leaf")]
    pub min_child_weight: f64,
    #[serde(alias = "min_gain_to_split")]
    pub min_split_gain: f64,
    #[serde(alias = "lambda_l2")]
    pub reg_lambda: f64,
    #[serde(alias = "bagging_fraction")]
    pub subsample: f64,
    #[serde(alias = "bagging_freq")]
    pub subsample_freq: usize,
    #[serde(alias = "feature_fraction")]
    pub colsample_bytree: f64,
    pub max_bin: usize,
    pub max_cat_to_onehot: usize,
    pub cat_smooth: f64,
    #[serde(alias = "seed", alias = "random_seed")]
    pub random_state: u64,
    #[serde(alias = "verbosity")]
    pub verbose: i64,
}

impl Default for LgbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: -1,
            min_child_samples: 20,
            min_child_weight: 1e-3,
            min_split_gain: 0.0,
            reg_lambda: 0.0,
            subsample: 1.0,
            subsample_freq: 0,
            colsample_bytree: 1.0,
            max_bin: 255,
            max_cat_to_onehot: 4,
            cat_smooth: 10.0,
            random_state: 0,
            verbose: -1,
        }
    }
}

impl LgbmParams {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(GbdtError::InvalidParameters(msg.to_string()));

        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return invalid("learning_rate must be positive");
        }
        if self.num_leaves < 2 {
            return invalid("num_leaves must be at least 2");
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return invalid("subsample must be in (0, 1]");
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return invalid("colsample_bytree must be in (0, 1]");
        }
        if self.max_bin < 2 {
            return invalid("max_bin must be at least 2");
        }
        if self.reg_lambda < 0.0 || self.min_child_weight < 0.0 || self.cat_smooth < 0.0 {
            return invalid("reg_lambda, min_child_weight and cat_smooth must be non-negative");
        }
        Ok(())
    }

    /// Depth limit, `None` when unlimited
    pub fn depth_limit(&self) -> Option<usize> {
        (self.max_depth > 0).then_some(self.max_depth as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ModelParams;

    #[test]
    fn test_defaults() {
        let params: LgbmParams = ModelParams::new().parse().unwrap();
        assert_eq!(params, LgbmParams::default());
        assert_eq!(params.depth_limit(), None);
    }

    #[test]
    fn test_aliases() {
        let params: LgbmParams = ModelParams::new()
            .with("num_boost_round", 7)
            .with("bagging_fraction", 0.5)
            .with("seed", 3)
            .parse()
            .unwrap();
        assert_eq!(params.n_estimators, 7);
        assert_eq!(params.subsample, 0.5);
        assert_eq!(params.random_state, 3);
    }

    #[test]
    fn test_validate() {
        let params = LgbmParams {
            num_leaves: 1,
            ..LgbmParams::default()
        };
        assert!(params.validate().is_err());
        assert!(LgbmParams::default().validate().is_ok());
    }
}
