//! Trained oblivious-tree ensemble and its boosting loop

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::binning::BinMapper;
use crate::dataset::FeatureMatrix;
use crate::deterministic::LcgRng;
use crate::errors::{GbdtError, Result};
use crate::estimator::EvalSet;
use crate::lgbm::booster::check_shapes;
use crate::objective::{prepare_target, ClassLabels, Objective};
use crate::serde_canon::digest_hex;
use crate::training::EarlyStopping;

use super::ctr::CtrTable;
use super::oblivious::{bin_column, ObliviousBuilder, ObliviousTree};
use super::params::CatBoostParams;

pub const FORMAT_VERSION: u32 = 1;

/// Trained oblivious-tree booster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatBooster {
    pub version: u32,
    pub objective: Objective,
    pub feature_names: Vec<String>,
    pub cat_features: Vec<usize>,
    pub ctr_tables: Vec<CtrTable>,
    pub init_score: f64,
    pub trees: Vec<ObliviousTree>,
    /// 1-based; predictions use the first `best_iteration` trees when set
    pub best_iteration: Option<usize>,
    pub classes: Option<ClassLabels>,
    pub learning_rate: f64,
    pub depth: usize,
}

impl CatBooster {
    pub fn train(
        params: &CatBoostParams,
        objective: Objective,
        x: &FeatureMatrix,
        y: &[f64],
        cat_features: &[usize],
        eval_set: Option<EvalSet<'_>>,
        early_stopping_rounds: Option<usize>,
    ) -> Result<Self> {
        params.validate()?;
        check_shapes(x, y)?;

        let (target, classes) = prepare_target(objective, y)?;
        let prior = target.iter().sum::<f64>() / target.len() as f64;

        // Ordered statistics replace categorical columns for training
        let mut rng = LcgRng::new(params.random_seed);
        let permutation = rng.permutation(x.n_rows());
        let mut ctr_tables = Vec::with_capacity(cat_features.len());
        let mut train_x = x.clone();
        for &feature in cat_features {
            let values = x.column(feature);
            let table = CtrTable::fit(feature, values, &target, prior, params.ctr_prior_weight);
            let encoded = table.ordered(values, &target, &permutation);
            debug!(
                "{}: {} categories",
                x.feature_names()[feature],
                table.n_categories()
            );
            train_x = train_x.with_column(feature, encoded);
            ctr_tables.push(table);
        }

        let mut booster = Self {
            version: FORMAT_VERSION,
            objective,
            feature_names: x.feature_names().to_vec(),
            cat_features: cat_features.to_vec(),
            ctr_tables,
            init_score: objective.init_score(&target),
            trees: Vec::with_capacity(params.iterations),
            best_iteration: None,
            classes,
            learning_rate: params.learning_rate,
            depth: params.depth,
        };

        let eval = match eval_set {
            Some(eval) => {
                check_shapes(eval.x, eval.y)?;
                let eval_target = match &booster.classes {
                    Some(c) => c.encode(eval.y),
                    None => eval.y.to_vec(),
                };
                Some((booster.encode(eval.x)?, eval_target))
            }
            None => None,
        };

        let mappers: Vec<BinMapper> = (0..train_x.n_features())
            .map(|f| BinMapper::fit(train_x.column(f), params.border_count + 1))
            .collect();
        let bins: Vec<Vec<u32>> = mappers
            .iter()
            .enumerate()
            .map(|(f, m)| bin_column(m, train_x.column(f)))
            .collect();
        let builder = ObliviousBuilder::new(
            &mappers,
            &bins,
            params.depth,
            params.l2_leaf_reg,
            params.learning_rate,
        );

        let n_rows = x.n_rows();
        let mut raw = vec![booster.init_score; n_rows];
        let mut eval_raw = eval
            .as_ref()
            .map(|(ex, _)| vec![booster.init_score; ex.n_rows()])
            .unwrap_or_default();
        let mut grad = vec![0.0; n_rows];
        let mut hess = vec![0.0; n_rows];
        let mut early_stopping = match (&eval, early_stopping_rounds) {
            (Some(_), Some(rounds)) => Some(EarlyStopping::new(rounds)),
            _ => None,
        };

        for iteration in 0..params.iterations {
            objective.gradients(&target, &raw, &mut grad, &mut hess);
            let tree = builder.build(&grad, &hess);

            for (r, score) in raw.iter_mut().enumerate() {
                *score += tree.evaluate(|f| train_x.value(r, f));
            }

            let mut stop = false;
            let report = params.verbose > 0 && (iteration + 1) as u64 % params.verbose == 0;
            if let Some((ex, ey)) = &eval {
                for (r, score) in eval_raw.iter_mut().enumerate() {
                    *score += tree.evaluate(|f| ex.value(r, f));
                }
                let loss = objective.loss(ey, &eval_raw);
                if report {
                    info!("{}:\ttest: {:.7}", iteration, loss);
                } else {
                    debug!("{}:\ttest: {:.7}", iteration, loss);
                }
                if let Some(es) = early_stopping.as_mut() {
                    stop = es.update(iteration + 1, loss);
                }
            } else if report {
                info!("{}:\tlearn: {:.7}", iteration, objective.loss(&target, &raw));
            }

            booster.trees.push(tree);
            if stop {
                break;
            }
        }

        booster.best_iteration = early_stopping.map(|es| es.best_iteration());
        if let Some(best) = booster.best_iteration {
            info!("bestIteration = {}", best.saturating_sub(1));
        }
        Ok(booster)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    fn active_trees(&self) -> &[ObliviousTree] {
        let n = self
            .best_iteration
            .filter(|&b| b > 0)
            .unwrap_or(self.trees.len())
            .min(self.trees.len());
        &self.trees[..n]
    }

    /// Replace categorical columns by their full-data statistics.
    fn encode(&self, x: &FeatureMatrix) -> Result<FeatureMatrix> {
        if x.feature_names() != self.feature_names.as_slice() {
            return Err(GbdtError::InvalidData(format!(
                "model expects features {:?}, got {:?}",
                self.feature_names,
                x.feature_names()
            )));
        }
        let mut encoded = x.clone();
        for table in &self.ctr_tables {
            let values = x
                .column(table.feature_idx)
                .iter()
                .map(|&v| table.encode(v))
                .collect();
            encoded = encoded.with_column(table.feature_idx, values);
        }
        Ok(encoded)
    }

    pub fn predict_raw(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let encoded = self.encode(x)?;
        let trees = self.active_trees();
        Ok((0..encoded.n_rows())
            .map(|r| {
                trees
                    .iter()
                    .fold(self.init_score, |acc, t| acc + t.evaluate(|f| encoded.value(r, f)))
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
            for split in &tree.splits {
                if let Some(slot) = gains.get_mut(split.feature_idx) {
                    *slot += split.gain;
                }
            }
        }
        gains
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let booster: Self = bincode::deserialize(bytes)?;
        if booster.version != FORMAT_VERSION {
            return Err(GbdtError::InvalidModel(format!(
                "unsupported model version {}",
                booster.version
            )));
        }
        for (i, tree) in booster.trees.iter().enumerate() {
            tree.validate(booster.feature_names.len())
                .map_err(|e| GbdtError::InvalidModel(format!("tree {}: {}", i, e)))?;
        }
        Ok(booster)
    }

    /// Write the bincode model; returns the blake3 digest of the file.
    pub fn save_model(&self, path: &Path) -> Result<String> {
        let bytes = self.to_bytes()?;
        fs::write(path, &bytes)?;
        Ok(digest_hex(&bytes))
    }

    pub fn load_model(path: &Path) -> Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }

    pub fn model_hash_hex(&self) -> Result<String> {
        Ok(digest_hex(&self.to_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (FeatureMatrix, Vec<f64>) {
        let n = 60;
        let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let c: Vec<f64> = (0..n).map(|i| (i % 4) as f64).collect();
        let y: Vec<f64> = (0..n)
            .map(|i| if i % 4 == 1 || i > 45 { 1.0 } else { 0.0 })
            .collect();
        let x = FeatureMatrix::new(vec!["a".into(), "c".into()], vec![a, c]).unwrap();
        (x, y)
    }

    fn params() -> CatBoostParams {
        CatBoostParams {
            iterations: 40,
            learning_rate: 0.3,
            depth: 3,
            ..CatBoostParams::default()
        }
    }

    #[test]
    fn test_classifier_learns_categorical_signal() {
        let (x, y) = data();
        let booster = CatBooster::train(&params(), Objective::Binary, &x, &y, &[1], None, None).unwrap();
        let pred = booster.predict(&x).unwrap();

        assert_eq!(booster.ctr_tables.len(), 1);
        assert!(pred.iter().all(|p| (0.0..=1.0).contains(p)));
        // Category 1 rows in the low range are positive, category 0 rows are not
        assert!(pred[5] > pred[4]);
    }

    #[test]
    fn test_bytes_round_trip() {
        let (x, y) = data();
        let booster = CatBooster::train(&params(), Objective::Binary, &x, &y, &[1], None, None).unwrap();
        let restored = CatBooster::from_bytes(&booster.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, booster);
        assert_eq!(restored.predict(&x).unwrap(), booster.predict(&x).unwrap());
    }

    #[test]
    fn test_training_is_deterministic() {
        let (x, y) = data();
        let a = CatBooster::train(&params(), Objective::Regression, &x, &y, &[1], None, None).unwrap();
        let b = CatBooster::train(&params(), Objective::Regression, &x, &y, &[1], None, None).unwrap();
        assert_eq!(a.model_hash_hex().unwrap(), b.model_hash_hex().unwrap());
    }

    #[test]
    fn test_trees_respect_depth() {
        let (x, y) = data();
        let booster = CatBooster::train(&params(), Objective::Regression, &x, &y, &[], None, None).unwrap();
        assert_eq!(booster.num_trees(), 40);
        assert!(booster.trees.iter().all(|t| t.depth() <= 3));
    }
}
