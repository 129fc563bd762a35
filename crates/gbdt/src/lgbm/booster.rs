//! Trained leaf-wise ensemble and its boosting loop

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::dataset::FeatureMatrix;
use crate::deterministic::LcgRng;
use crate::errors::{GbdtError, Result};
use crate::estimator::EvalSet;
use crate::objective::{prepare_target, ClassLabels, Objective};
use crate::serde_canon::{digest_hex, to_canonical_json};
use crate::training::EarlyStopping;

use super::grower::{BinnedData, GrowerConfig, TreeGrower};
use super::params::LgbmParams;
use super::tree::Tree;

/// Model file format version
pub const FORMAT_VERSION: u32 = 1;

/// Trained leaf-wise booster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LgbmBooster {
    pub version: u32,
    pub objective: Objective,
    pub feature_names: Vec<String>,
    pub categorical_features: Vec<usize>,
    pub init_score: f64,
    pub trees: Vec<Tree>,
    /// 1-based; predictions use the first `best_iteration` trees when set
    pub best_iteration: Option<usize>,
    pub classes: Option<ClassLabels>,
    pub params: LgbmParams,
}

impl LgbmBooster {
    pub fn train(
        params: &LgbmParams,
        objective: Objective,
        x: &FeatureMatrix,
        y: &[f64],
        categorical: &[usize],
        eval_set: Option<EvalSet<'_>>,
        early_stopping_rounds: Option<usize>,
    ) -> Result<Self> {
        params.validate()?;
        check_shapes(x, y)?;

        let (target, classes) = prepare_target(objective, y)?;
        let eval = match eval_set {
            Some(eval) => {
                check_shapes(eval.x, eval.y)?;
                if eval.x.feature_names() != x.feature_names() {
                    return Err(GbdtError::InvalidData(
                        "eval set features differ from training features".into(),
                    ));
                }
                let eval_target = match &classes {
                    Some(c) => c.encode(eval.y),
                    None => eval.y.to_vec(),
                };
                Some((eval.x, eval_target))
            }
            None => None,
        };

        let binned = BinnedData::build(x, categorical, params.max_bin)?;
        let config = GrowerConfig {
            num_leaves: params.num_leaves,
            max_depth: params.depth_limit(),
            min_child_samples: params.min_child_samples,
            min_child_weight: params.min_child_weight,
            min_split_gain: params.min_split_gain,
            reg_lambda: params.reg_lambda,
            learning_rate: params.learning_rate,
            max_cat_to_onehot: params.max_cat_to_onehot,
            cat_smooth: params.cat_smooth,
        };

        let n_rows = x.n_rows();
        let n_features = x.n_features();
        let init_score = objective.init_score(&target);
        let mut raw = vec![init_score; n_rows];
        let mut eval_raw = eval
            .as_ref()
            .map(|(ex, _)| vec![init_score; ex.n_rows()])
            .unwrap_or_default();
        let mut grad = vec![0.0; n_rows];
        let mut hess = vec![0.0; n_rows];

        let mut rng = LcgRng::new(params.random_state);
        let bagging = params.subsample < 1.0 && params.subsample_freq > 0;
        let mut bag: Vec<usize> = (0..n_rows).collect();
        let n_columns = ((params.colsample_bytree * n_features as f64).round() as usize)
            .clamp(1, n_features.max(1));

        let mut early_stopping = match (&eval, early_stopping_rounds) {
            (Some(_), Some(rounds)) => Some(EarlyStopping::new(rounds)),
            _ => None,
        };
        let mut trees = Vec::with_capacity(params.n_estimators);

        for iteration in 0..params.n_estimators {
            if bagging && iteration % params.subsample_freq == 0 {
                bag = (0..n_rows)
                    .filter(|_| rng.next_f64() < params.subsample)
                    .collect();
                if bag.is_empty() {
                    bag.push(rng.next_range(n_rows));
                }
            }
            let features: Vec<usize> = if n_columns < n_features {
                let mut chosen: Vec<usize> = rng.permutation(n_features);
                chosen.truncate(n_columns);
                chosen.sort_unstable();
                chosen
            } else {
                (0..n_features).collect()
            };

            objective.gradients(&target, &raw, &mut grad, &mut hess);
            let tree = TreeGrower::new(&binned, &config, &grad, &hess).grow(bag.clone(), &features);

            for (r, score) in raw.iter_mut().enumerate() {
                *score += tree.evaluate(|f| x.value(r, f));
            }

            let mut stop = false;
            if let Some((ex, ey)) = &eval {
                for (r, score) in eval_raw.iter_mut().enumerate() {
                    *score += tree.evaluate(|f| ex.value(r, f));
                }
                let loss = objective.loss(ey, &eval_raw);
                debug!(
                    "[{}] valid {}: {:.6} ({} leaves)",
                    iteration + 1,
                    objective.name(),
                    loss,
                    tree.n_leaves()
                );
                if let Some(es) = early_stopping.as_mut() {
                    stop = es.update(iteration + 1, loss);
                }
            } else {
                debug!("[{}] tree with {} leaves", iteration + 1, tree.n_leaves());
            }

            trees.push(tree);
            if stop {
                break;
            }
        }

        let best_iteration = early_stopping.map(|es| es.best_iteration());
        if let Some(best) = best_iteration {
            info!("Early stopping, best iteration is [{}]", best);
        }

        Ok(Self {
            version: FORMAT_VERSION,
            objective,
            feature_names: x.feature_names().to_vec(),
            categorical_features: categorical.to_vec(),
            init_score,
            trees,
            best_iteration,
            classes,
            params: params.clone(),
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Trees used for prediction
    fn active_trees(&self) -> &[Tree] {
        let n = self
            .best_iteration
            .filter(|&b| b > 0)
            .unwrap_or(self.trees.len())
            .min(self.trees.len());
        &self.trees[..n]
    }

    pub fn predict_raw(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        if x.feature_names() != self.feature_names.as_slice() {
            return Err(GbdtError::InvalidData(format!(
                "model expects features {:?}, got {:?}",
                self.feature_names,
                x.feature_names()
            )));
        }
        let trees = self.active_trees();
        Ok((0..x.n_rows())
            .map(|r| {
                trees
                    .iter()
                    .fold(self.init_score, |acc, t| acc + t.evaluate(|f| x.value(r, f)))
            })
            .collect())
    }

    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let raw = self.predict_raw(x)?;
        Ok(raw.into_iter().map(|v| self.objective.transform(v)).collect())
    }

    /// Total split gain per feature over the trees used for prediction
    pub fn feature_importance(&self) -> Vec<f64> {
        let mut gains = vec![0.0; self.feature_names.len()];
        for tree in self.active_trees() {
            tree.accumulate_gain(&mut gains);
        }
        gains
    }

    pub fn to_json(&self) -> Result<String> {
        to_canonical_json(self)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let booster: Self = serde_json::from_str(json)?;
        booster.validate()?;
        Ok(booster)
    }

    fn validate(&self) -> Result<()> {
        if self.version != FORMAT_VERSION {
            return Err(GbdtError::InvalidModel(format!(
                "unsupported model version {}",
                self.version
            )));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_names.len())
                .map_err(|e| GbdtError::InvalidModel(format!("tree {}: {}", i, e)))?;
        }
        Ok(())
    }

    /// Write the canonical JSON model; returns the blake3 digest of the file.
    pub fn save_model(&self, path: &Path) -> Result<String> {
        let json = self.to_json()?;
        fs::write(path, json.as_bytes())?;
        Ok(digest_hex(json.as_bytes()))
    }

    pub fn load_model(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn model_hash_hex(&self) -> Result<String> {
        Ok(digest_hex(self.to_json()?.as_bytes()))
    }
}

pub(crate) fn check_shapes(x: &FeatureMatrix, y: &[f64]) -> Result<()> {
    if x.n_rows() != y.len() {
        return Err(GbdtError::InvalidData(format!(
            "{} rows but {} labels",
            x.n_rows(),
            y.len()
        )));
    }
    if x.n_rows() == 0 {
        return Err(GbdtError::InvalidData("no training rows".into()));
    }
    if x.n_features() == 0 {
        return Err(GbdtError::InvalidData("no features".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data(n: usize) -> (FeatureMatrix, Vec<f64>) {
        let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| ((i * 37) % 11) as f64).collect();
        let y: Vec<f64> = a.iter().map(|v| 2.0 * v + 1.0).collect();
        let x = FeatureMatrix::new(vec!["a".into(), "b".into()], vec![a, b]).unwrap();
        (x, y)
    }

    fn small_params() -> LgbmParams {
        LgbmParams {
            n_estimators: 30,
            min_child_samples: 2,
            num_leaves: 8,
            ..LgbmParams::default()
        }
    }

    #[test]
    fn test_regression_fits_training_data() {
        let (x, y) = linear_data(60);
        let booster =
            LgbmBooster::train(&small_params(), Objective::Regression, &x, &y, &[], None, None)
                .unwrap();
        let pred = booster.predict(&x).unwrap();
        let mse: f64 = pred.iter().zip(&y).map(|(p, t)| (p - t) * (p - t)).sum::<f64>() / 60.0;
        let variance: f64 = {
            let mean = y.iter().sum::<f64>() / 60.0;
            y.iter().map(|t| (t - mean) * (t - mean)).sum::<f64>() / 60.0
        };
        assert_eq!(booster.num_trees(), 30);
        assert!(mse < variance * 0.1);
    }

    #[test]
    fn test_training_is_deterministic() {
        let (x, y) = linear_data(40);
        let params = LgbmParams {
            subsample: 0.7,
            subsample_freq: 1,
            colsample_bytree: 0.5,
            ..small_params()
        };
        let a = LgbmBooster::train(&params, Objective::Regression, &x, &y, &[], None, None).unwrap();
        let b = LgbmBooster::train(&params, Objective::Regression, &x, &y, &[], None, None).unwrap();
        assert_eq!(a.model_hash_hex().unwrap(), b.model_hash_hex().unwrap());
    }

    #[test]
    fn test_early_stopping_sets_best_iteration() {
        let (x, y) = linear_data(60);
        let eval = EvalSet { x: &x, y: &y };
        let params = LgbmParams {
            n_estimators: 500,
            ..small_params()
        };
        let booster =
            LgbmBooster::train(&params, Objective::Regression, &x, &y, &[], Some(eval), Some(5))
                .unwrap();
        let best = booster.best_iteration.unwrap();
        assert!(best >= 1 && best <= booster.num_trees());
    }

    #[test]
    fn test_json_round_trip() {
        let (x, y) = linear_data(30);
        let booster =
            LgbmBooster::train(&small_params(), Objective::Regression, &x, &y, &[], None, None)
                .unwrap();
        let restored = LgbmBooster::from_json(&booster.to_json().unwrap()).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), booster.predict(&x).unwrap());
    }

    #[test]
    fn test_predict_rejects_other_features() {
        let (x, y) = linear_data(30);
        let booster =
            LgbmBooster::train(&small_params(), Objective::Regression, &x, &y, &[], None, None)
                .unwrap();
        let other = FeatureMatrix::new(vec!["z".into()], vec![vec![1.0]]).unwrap();
        assert!(booster.predict(&other).is_err());
    }

    #[test]
    fn test_from_json_rejects_bad_version() {
        let (x, y) = linear_data(30);
        let mut booster =
            LgbmBooster::train(&small_params(), Objective::Regression, &x, &y, &[], None, None)
                .unwrap();
        booster.version = 99;
        let json = serde_json::to_string(&booster).unwrap();
        assert!(matches!(
            LgbmBooster::from_json(&json),
            Err(GbdtError::InvalidModel(_))
        ));
    }
}
