//! Quantile binning of numeric features
//!
//! A feature with at most `max_bin` distinct values gets one bin per value;
//! otherwise bins hold roughly equal row counts. Thresholds sit midway between
//! adjacent distinct values, so `value <= threshold(b)` holds exactly for rows
//! in bins `0..=b`.

use serde::{Deserialize, Serialize};

/// Bin boundaries of one numeric feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinMapper {
    thresholds: Vec<f64>,
}

impl BinMapper {
    /// Compute boundaries from the non-NaN values of a column.
    pub fn fit(values: &[f64], max_bin: usize) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut distinct: Vec<(f64, usize)> = Vec::new();
        for value in sorted.iter().copied() {
            match distinct.last_mut() {
                Some((last, count)) if *last == value => *count += 1,
                _ => distinct.push((value, 1)),
            }
        }

        let max_bin = max_bin.max(2);
        let mut thresholds = Vec::new();

        if distinct.len() <= max_bin {
            for pair in distinct.windows(2) {
                thresholds.push(midpoint(pair[0].0, pair[1].0));
            }
        } else {
            let per_bin = sorted.len() as f64 / max_bin as f64;
            let mut next_cut = per_bin;
            let mut cumulative = 0usize;

            for pair in distinct.windows(2) {
                cumulative += pair[0].1;
                if cumulative as f64 >= next_cut {
                    thresholds.push(midpoint(pair[0].0, pair[1].0));
                    while next_cut <= cumulative as f64 {
                        next_cut += per_bin;
                    }
                    if thresholds.len() + 1 >= max_bin {
                        break;
                    }
                }
            }
        }

        Self { thresholds }
    }

    /// Bin of a value, `None` for NaN.
    #[inline]
    pub fn bin(&self, value: f64) -> Option<u32> {
        if value.is_nan() {
            None
        } else {
            Some(self.thresholds.partition_point(|&t| t < value) as u32)
        }
    }

    pub fn n_bins(&self) -> usize {
        self.thresholds.len() + 1
    }

    /// Upper boundary of bin `bin`.
    pub fn threshold(&self, bin: usize) -> f64 {
        self.thresholds[bin]
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }
}

/// Boundary between two adjacent distinct values; finite even for infinite inputs.
fn midpoint(lower: f64, upper: f64) -> f64 {
    if lower == f64::NEG_INFINITY {
        f64::MIN
    } else if upper == f64::INFINITY {
        f64::MAX
    } else {
        let mid = lower + (upper - lower) / 2.0;
        if mid >= upper {
            lower
        } else {
            mid
        }
    }
}
