//! Named numeric vector used for targets

use crate::errors::Result;
use crate::frame::Column;

/// Named `f64` series
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    name: String,
    values: Vec<f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Numeric conversion of a frame column, keeping its name.
    pub fn from_column(column: &Column) -> Result<Self> {
        Ok(Self::new(column.name(), column.to_f64()?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}
