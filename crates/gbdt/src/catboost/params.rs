//! Oblivious-tree booster hyperparameters

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::{GbdtError, Result};

/// Constructor parameters of `CatBoostClassifier` / `CatBoostRegressor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatBoostParams {
    #[serde(alias = "n_estimators", alias = "num_boost_round", alias = "num_trees")]
    pub iterations: usize,
    #[serde(alias = "eta")]
    pub learning_rate: f64,
    #[serde(alias = "max_depth")]
    pub depth: usize,
    #[serde(alias = "reg_lambda")]
    pub l2_leaf_reg: f64,
    #[serde(alias = "max_bin")]
    pub border_count: usize,
    #[serde(alias = "random_state", alias = "seed")]
    pub random_seed: u64,
    pub ctr_prior_weight: f64,
    /// Log every N iterations; `true` means every iteration
    #[serde(deserialize_with = "verbosity")]
    pub verbose: u64,
}

impl Default for CatBoostParams {
    fn default() -> Self {
        Self {
            iterations: 1000,
            learning_rate: 0.03,
            depth: 6,
            l2_leaf_reg: 3.0,
            border_count: 254,
            random_seed: 0,
            ctr_prior_weight: 1.0,
            verbose: 0,
        }
    }
}

fn verbosity<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Every(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Flag(true) => 1,
        Raw::Flag(false) => 0,
        Raw::Every(n) => n,
    })
}

impl CatBoostParams {
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(GbdtError::InvalidParameters("learning_rate must be positive".into()));
        }
        if self.depth == 0 || self.depth > 16 {
            return Err(GbdtError::InvalidParameters("depth must be in 1..=16".into()));
        }
        if self.border_count < 1 {
            return Err(GbdtError::InvalidParameters("border_count must be positive".into()));
        }
        if self.l2_leaf_reg < 0.0 || self.ctr_prior_weight < 0.0 {
            return Err(GbdtError::InvalidParameters(
                "l2_leaf_reg and ctr_prior_weight must be non-negative".into(),
            ));
        }
        Ok(())
    }
}
