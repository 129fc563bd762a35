//! Target statistics for categorical features
//!
//! During training each row sees only the rows before it in a random
//! permutation; at prediction time the statistics of the full training set
//! are used. Unseen categories fall back to the prior.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CtrStat {
    pub sum: f64,
    pub count: f64,
}

/// Full-data statistics of one categorical feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtrTable {
    pub feature_idx: usize,
    pub prior: f64,
    pub prior_weight: f64,
    pub stats: BTreeMap<u64, CtrStat>,
}

/// Map a category value to a stable key; every NaN shares one key.
#[inline]
fn key(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

impl CtrTable {
    pub fn fit(feature_idx: usize, values: &[f64], target: &[f64], prior: f64, prior_weight: f64) -> Self {
        let mut stats: BTreeMap<u64, CtrStat> = BTreeMap::new();
        for (&v, &t) in values.iter().zip(target) {
            let stat = stats.entry(key(v)).or_default();
            stat.sum += t;
            stat.count += 1.0;
        }
        Self {
            feature_idx,
            prior,
            prior_weight,
            stats,
        }
    }

    fn smooth(&self, stat: CtrStat) -> f64 {
        let denom = stat.count + self.prior_weight;
        if denom <= 0.0 {
            self.prior
        } else {
            (stat.sum + self.prior_weight * self.prior) / denom
        }
    }

    /// Encoding used at prediction time
    pub fn encode(&self, value: f64) -> f64 {
        self.smooth(self.stats.get(&key(value)).copied().unwrap_or_default())
    }

    /// Ordered encoding of training rows along `permutation`.
    pub fn ordered(&self, values: &[f64], target: &[f64], permutation: &[usize]) -> Vec<f64> {
        let mut running: BTreeMap<u64, CtrStat> = BTreeMap::new();
        let mut encoded = vec![self.prior; values.len()];
        for &row in permutation {
            let stat = running.entry(key(values[row])).or_default();
            encoded[row] = self.smooth(*stat);
            stat.sum += target[row];
            stat.count += 1.0;
        }
        encoded
    }

    pub fn n_categories(&self) -> usize {
        self.stats.len()
    }
}
