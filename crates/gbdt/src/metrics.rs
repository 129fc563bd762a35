//! Evaluation metrics
//!
//! All metrics take `(y_true, y_pred)` slices of equal length.

use std::fmt;
use std::sync::Arc;

type MetricFn = dyn Fn(&[f64], &[f64]) -> f64 + Send + Sync;

/// Named evaluation function
#[derive(Clone)]
pub struct Metric {
    name: String,
    func: Arc<MetricFn>,
}

impl Metric {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn roc_auc() -> Self {
        Self::new("roc_auc_score", roc_auc_score)
    }

    pub fn mean_squared_error() -> Self {
        Self::new("mean_squared_error", mean_squared_error)
    }

    pub fn root_mean_squared_error() -> Self {
        Self::new("root_mean_squared_error", root_mean_squared_error)
    }

    pub fn mean_absolute_error() -> Self {
        Self::new("mean_absolute_error", mean_absolute_error)
    }

    pub fn log_loss() -> Self {
        Self::new("log_loss", log_loss)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score(&self, y_true: &[f64], y_pred: &[f64]) -> f64 {
        (self.func)(y_true, y_pred)
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric").field("name", &self.name).finish()
    }
}

/// Area under the ROC curve, computed from average ranks.
///
/// The larger label is the positive class. Returns NaN unless `y_true` holds
/// exactly two distinct values.
pub fn roc_auc_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len().min(y_pred.len());
    let mut classes: Vec<f64> = Vec::new();
    for &y in &y_true[..n] {
        if !classes.contains(&y) {
            classes.push(y);
        }
    }
    if classes.len() != 2 {
        return f64::NAN;
    }
    let positive = classes[0].max(classes[1]);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| y_pred[a].total_cmp(&y_pred[b]));

    // Average 1-based rank within each run of tied scores
    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && y_pred[order[end]] == y_pred[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }

    let mut n_pos = 0.0;
    let mut rank_sum = 0.0;
    for i in 0..n {
        if y_true[i] == positive {
            n_pos += 1.0;
            rank_sum += ranks[i];
        }
    }
    let n_neg = n as f64 - n_pos;

    (rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}

pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mean(y_true.iter().zip(y_pred).map(|(t, p)| (t - p) * (t - p)), y_true.len())
}

pub fn root_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mean_squared_error(y_true, y_pred).sqrt()
}

pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mean(y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()), y_true.len())
}

/// Binary cross-entropy; predictions are probabilities of the larger label.
pub fn log_loss(y_true: &[f64], y_pred: &[f64]) -> f64 {
    const EPS: f64 = 1e-15;
    let positive = y_true.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    mean(
        y_true.iter().zip(y_pred).map(|(&t, &p)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            if t == positive {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        }),
        y_true.len(),
    )
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        return f64::NAN;
    }
    values.sum::<f64>() / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auc_perfect_and_inverted() {
        let y = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc_score(&y, &[0.1, 0.2, 0.8, 0.9]), 1.0);
        assert_eq!(roc_auc_score(&y, &[0.9, 0.8, 0.2, 0.1]), 0.0);
    }

    #[test]
    fn test_auc_with_ties() {
        let y = [0.0, 1.0];
        assert_eq!(roc_auc_score(&y, &[0.5, 0.5]), 0.5);

        let y = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc_score(&y, &[0.1, 0.4, 0.35, 0.8]), 0.75);
    }

    #[test]
    fn test_auc_single_class_is_nan() {
        assert!(roc_auc_score(&[1.0, 1.0], &[0.2, 0.3]).is_nan());
    }

    #[test]
    fn test_auc_uses_larger_label_as_positive() {
        let y = [3.0, 3.0, 7.0, 7.0];
        assert_eq!(roc_auc_score(&y, &[0.1, 0.2, 0.8, 0.9]), 1.0);
    }

    #[test]
    fn test_regression_metrics() {
        let t = [1.0, 2.0, 3.0];
        let p = [1.0, 2.0, 5.0];
        assert!((mean_squared_error(&t, &p) - 4.0 / 3.0).abs() < 1e-12);
        assert!((mean_absolute_error(&t, &p) - 2.0 / 3.0).abs() < 1e-12);
        assert!((root_mean_squared_error(&t, &p) - (4.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_log_loss() {
        let loss = log_loss(&[0.0, 1.0], &[0.5, 0.5]);
        assert!((loss - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_custom_metric() {
        let metric = Metric::new("max_error", |t: &[f64], p: &[f64]| {
            t.iter().zip(p).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max)
        });
        assert_eq!(metric.name(), "max_error");
        assert_eq!(metric.score(&[1.0, 2.0], &[1.5, 4.0]), 2.0);
        assert_eq!(format!("{:?}", metric), "Metric { name: \"max_error\" }");
    }
}
