//! Training objectives
//!
//! Second-order gradients for binary log-loss and squared error, plus the
//! label encoding used by the classifiers.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{GbdtError, Result};

/// Smallest hessian used for log-loss, keeps leaf values finite
const MIN_HESSIAN: f64 = 1e-16;
/// Probability clamp for log-loss evaluation
const EPS: f64 = 1e-15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    Binary,
    Regression,
}

impl Objective {
    pub fn name(&self) -> &'static str {
        match self {
            Objective::Binary => "binary",
            Objective::Regression => "regression",
        }
    }

    /// Constant raw score the ensemble starts from
    pub fn init_score(&self, target: &[f64]) -> f64 {
        if target.is_empty() {
            return 0.0;
        }
        let mean = target.iter().sum::<f64>() / target.len() as f64;
        match self {
            Objective::Binary => {
                let p = mean.clamp(EPS, 1.0 - EPS);
                (p / (1.0 - p)).ln()
            }
            Objective::Regression => mean,
        }
    }

    /// Fill gradients and hessians of the loss with respect to the raw score.
    pub fn gradients(&self, target: &[f64], raw: &[f64], grad: &mut [f64], hess: &mut [f64]) {
        match self {
            Objective::Binary => {
                for i in 0..target.len() {
                    let p = sigmoid(raw[i]);
                    grad[i] = p - target[i];
                    hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
                }
            }
            Objective::Regression => {
                for i in 0..target.len() {
                    grad[i] = raw[i] - target[i];
                    hess[i] = 1.0;
                }
            }
        }
    }

    /// Map a raw score to the prediction scale.
    #[inline]
    pub fn transform(&self, raw: f64) -> f64 {
        match self {
            Objective::Binary => sigmoid(raw),
            Objective::Regression => raw,
        }
    }

    /// Mean loss used for early stopping.
    pub fn loss(&self, target: &[f64], raw: &[f64]) -> f64 {
        if target.is_empty() {
            return 0.0;
        }
        let total: f64 = match self {
            Objective::Binary => target
                .iter()
                .zip(raw)
                .map(|(&y, &r)| {
                    let p = sigmoid(r).clamp(EPS, 1.0 - EPS);
                    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
                })
                .sum(),
            Objective::Regression => target
                .iter()
                .zip(raw)
                .map(|(&y, &r)| (r - y) * (r - y))
                .sum(),
        };
        total / target.len() as f64
    }
}

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// The two classes of a binary target; the larger label is positive.
///
/// A target holding a single class is paired with an unseen partner:
/// positive labels pair with `0.0`, anything else with `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassLabels {
    pub negative: f64,
    pub positive: f64,
}

impl ClassLabels {
    pub fn fit(y: &[f64]) -> Result<Self> {
        let mut classes: Vec<f64> = Vec::new();
        for &v in y {
            if v.is_nan() {
                return Err(GbdtError::InvalidData("target contains NaN".into()));
            }
            if !classes.contains(&v) {
                classes.push(v);
                if classes.len() > 2 {
                    return Err(GbdtError::InvalidData(
                        "binary target has more than two classes".into(),
                    ));
                }
            }
        }

        match classes.as_slice() {
            [a, b] => Ok(Self {
                negative: a.min(*b),
                positive: a.max(*b),
            }),
            [v] if *v > 0.0 => Ok(Self {
                negative: 0.0,
                positive: *v,
            }),
            [v] => Ok(Self {
                negative: *v,
                positive: 1.0,
            }),
            _ => Err(GbdtError::InvalidData("binary target is empty".into())),
        }
    }

    /// True when `y` held one class only at fit time.
    pub fn is_degenerate(&self, y: &[f64]) -> bool {
        y.iter().all(|&v| v == self.positive) || y.iter().all(|&v| v == self.negative)
    }

    /// 1.0 for the positive class, 0.0 for anything else.
    pub fn encode(&self, y: &[f64]) -> Vec<f64> {
        y.iter()
            .map(|&v| if v == self.positive { 1.0 } else { 0.0 })
            .collect()
    }
}

/// Checks shared by every backend before training starts
pub(crate) fn prepare_target(
    objective: Objective,
    y: &[f64],
) -> Result<(Vec<f64>, Option<ClassLabels>)> {
    match objective {
        Objective::Binary => {
            let classes = ClassLabels::fit(y)?;
            if classes.is_degenerate(y) {
                warn!(
                    "training target has a single class {}; predictions follow the class prior",
                    y[0]
                );
            }
            Ok((classes.encode(y), Some(classes)))
        }
        Objective::Regression => {
            if y.iter().any(|v| !v.is_finite()) {
                return Err(GbdtError::InvalidData(
                    "regression target must be finite".into(),
                ));
            }
            Ok((y.to_vec(), None))
        }
    }
}
