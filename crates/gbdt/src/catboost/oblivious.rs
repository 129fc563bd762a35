//! Symmetric (oblivious) trees
//!
//! Every level applies the same `value > border` test, so a row's leaf is the
//! bit pattern of its level outcomes. NaN compares as smaller than any border.

use serde::{Deserialize, Serialize};

use crate::binning::BinMapper;
use crate::deterministic::{prefer, SplitTieBreaker};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObliviousSplit {
    pub feature_idx: usize,
    pub border: f64,
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObliviousTree {
    pub splits: Vec<ObliviousSplit>,
    /// `2^splits.len()` values, learning rate included
    pub leaf_values: Vec<f64>,
}

impl ObliviousTree {
    #[inline]
    pub fn leaf_index<F: Fn(usize) -> f64>(&self, feature: F) -> usize {
        self.splits
            .iter()
            .enumerate()
            .fold(0usize, |idx, (level, split)| {
                let v = feature(split.feature_idx);
                if !v.is_nan() && v > split.border {
                    idx | (1 << level)
                } else {
                    idx
                }
            })
    }

    pub fn evaluate<F: Fn(usize) -> f64>(&self, feature: F) -> f64 {
        self.leaf_values
            .get(self.leaf_index(feature))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn depth(&self) -> usize {
        self.splits.len()
    }

    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.leaf_values.len() != 1usize << self.splits.len() {
            return Err(format!(
                "{} leaf values for {} levels",
                self.leaf_values.len(),
                self.splits.len()
            ));
        }
        if let Some(split) = self.splits.iter().find(|s| s.feature_idx >= n_features) {
            return Err(format!("split on unknown feature {}", split.feature_idx));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Stat {
    grad: f64,
    hess: f64,
}

/// Binned training columns for oblivious tree search
pub(crate) struct ObliviousBuilder<'a> {
    mappers: &'a [BinMapper],
    /// Per feature, per row; NaN shares bin 0 with the smallest values
    bins: &'a [Vec<u32>],
    depth: usize,
    l2_leaf_reg: f64,
    learning_rate: f64,
}

impl<'a> ObliviousBuilder<'a> {
    pub fn new(
        mappers: &'a [BinMapper],
        bins: &'a [Vec<u32>],
        depth: usize,
        l2_leaf_reg: f64,
        learning_rate: f64,
    ) -> Self {
        Self {
            mappers,
            bins,
            depth,
            l2_leaf_reg,
            learning_rate,
        }
    }

    fn score(&self, stat: &Stat) -> f64 {
        let denom = stat.hess + self.l2_leaf_reg;
        if denom <= 0.0 {
            0.0
        } else {
            stat.grad * stat.grad / denom
        }
    }

    pub fn build(&self, grad: &[f64], hess: &[f64]) -> ObliviousTree {
        let n_rows = grad.len();
        let mut leaf_of = vec![0usize; n_rows];
        let mut splits: Vec<ObliviousSplit> = Vec::with_capacity(self.depth);

        for level in 0..self.depth {
            let n_leaves = 1usize << level;
            let mut leaf_totals = vec![Stat::default(); n_leaves];
            for r in 0..n_rows {
                leaf_totals[leaf_of[r]].grad += grad[r];
                leaf_totals[leaf_of[r]].hess += hess[r];
            }
            let base: f64 = leaf_totals.iter().map(|s| self.score(s)).sum();

            let mut best: Option<(f64, SplitTieBreaker, usize, usize)> = None;
            for (feature_idx, mapper) in self.mappers.iter().enumerate() {
                let n_bins = mapper.n_bins();
                if n_bins < 2 {
                    continue;
                }
                let bins = &self.bins[feature_idx];
                let mut hist = vec![Stat::default(); n_leaves * n_bins];
                for r in 0..n_rows {
                    let slot = &mut hist[leaf_of[r] * n_bins + bins[r] as usize];
                    slot.grad += grad[r];
                    slot.hess += hess[r];
                }

                let mut left = vec![Stat::default(); n_leaves];
                for bin in 0..n_bins - 1 {
                    let mut gain = -base;
                    for leaf in 0..n_leaves {
                        let stat = hist[leaf * n_bins + bin];
                        left[leaf].grad += stat.grad;
                        left[leaf].hess += stat.hess;
                        let right = Stat {
                            grad: leaf_totals[leaf].grad - left[leaf].grad,
                            hess: leaf_totals[leaf].hess - left[leaf].hess,
                        };
                        gain += self.score(&left[leaf]) + self.score(&right);
                    }
                    let tie = SplitTieBreaker::new(feature_idx, bin, level);
                    if gain > 0.0 && prefer(gain, tie, best.map(|(g, t, _, _)| (g, t))) {
                        best = Some((gain, tie, feature_idx, bin));
                    }
                }
            }

            let Some((gain, _, feature_idx, bin)) = best else {
                break;
            };
            let bins = &self.bins[feature_idx];
            for r in 0..n_rows {
                if bins[r] as usize > bin {
                    leaf_of[r] |= 1 << level;
                }
            }
            splits.push(ObliviousSplit {
                feature_idx,
                border: self.mappers[feature_idx].threshold(bin),
                gain,
            });
        }

        let mut totals = vec![Stat::default(); 1usize << splits.len()];
        for r in 0..n_rows {
            totals[leaf_of[r]].grad += grad[r];
            totals[leaf_of[r]].hess += hess[r];
        }
        let leaf_values = totals
            .iter()
            .map(|s| {
                let denom = s.hess + self.l2_leaf_reg;
                if denom <= 0.0 {
                    0.0
                } else {
                    -s.grad / denom * self.learning_rate
                }
            })
            .collect();

        ObliviousTree {
            splits,
            leaf_values,
        }
    }
}

/// Bin a column for oblivious search, mapping NaN to bin 0.
pub(crate) fn bin_column(mapper: &BinMapper, values: &[f64]) -> Vec<u32> {
    values.iter().map(|&v| mapper.bin(v).unwrap_or(0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_index_bits() {
        let tree = ObliviousTree {
            splits: vec![
                ObliviousSplit {
                    feature_idx: 0,
                    border: 0.5,
                    gain: 1.0,
                },
                ObliviousSplit {
                    feature_idx: 1,
                    border: 10.0,
                    gain: 1.0,
                },
            ],
            leaf_values: vec![0.0, 1.0, 2.0, 3.0],
        };
        let row = |a: f64, b: f64| move |f: usize| if f == 0 { a } else { b };
        assert_eq!(tree.evaluate(row(0.0, 0.0)), 0.0);
        assert_eq!(tree.evaluate(row(1.0, 0.0)), 1.0);
        assert_eq!(tree.evaluate(row(0.0, 11.0)), 2.0);
        assert_eq!(tree.evaluate(row(1.0, 11.0)), 3.0);
        assert_eq!(tree.evaluate(row(f64::NAN, 11.0)), 2.0);
        assert!(tree.validate(2).is_ok());
        assert!(tree.validate(1).is_err());
    }

    #[test]
    fn test_builder_finds_separating_border() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        let mapper = BinMapper::fit(&values, 254);
        let mappers = vec![mapper.clone()];
        let bins = vec![bin_column(&mapper, &values)];
        let grad = vec![1.0, 1.0, -1.0, -1.0];
        let hess = vec![1.0; 4];

        let tree = ObliviousBuilder::new(&mappers, &bins, 3, 0.0, 1.0).build(&grad, &hess);
        assert_eq!(tree.splits[0].border, 2.5);
        assert_eq!(tree.evaluate(|_| 1.0), -1.0);
        assert_eq!(tree.evaluate(|_| 4.0), 1.0);
    }

    #[test]
    fn test_constant_features_give_single_leaf() {
        let values = vec![5.0; 4];
        let mapper = BinMapper::fit(&values, 254);
        let mappers = vec![mapper.clone()];
        let bins = vec![bin_column(&mapper, &values)];
        let tree = ObliviousBuilder::new(&mappers, &bins, 6, 3.0, 0.1)
            .build(&[1.0, -1.0, 1.0, 1.0], &[1.0; 4]);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.leaf_values.len(), 1);
    }
}
