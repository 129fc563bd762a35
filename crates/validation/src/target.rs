//! Target type inference

use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    Binary,
    Multiclass,
    Continuous,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Binary => "binary",
            TargetType::Multiclass => "multiclass",
            TargetType::Continuous => "continuous",
        }
    }

    pub fn is_classification(&self) -> bool {
        matches!(self, TargetType::Binary | TargetType::Multiclass)
    }
}

impl FromStr for TargetType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(TargetType::Binary),
            "multiclass" => Ok(TargetType::Multiclass),
            "continuous" => Ok(TargetType::Continuous),
            other => Err(ValidationError::UnknownTargetType(other.to_string())),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a target vector.
///
/// Any non-integral (or non-finite) value makes the target continuous;
/// otherwise at most two distinct values is binary and more is multiclass.
pub fn type_of_target(y: &[f64]) -> TargetType {
    if y.iter().any(|v| !v.is_finite() || v.fract() != 0.0) {
        return TargetType::Continuous;
    }

    let mut distinct: Vec<f64> = Vec::with_capacity(3);
    for &v in y {
        if !distinct.contains(&v) {
            distinct.push(v);
            if distinct.len() > 2 {
                return TargetType::Multiclass;
            }
        }
    }
    TargetType::Binary
}
