//! Column-oriented data frame with an optional named index
//!
//! Only the operations the experiment pipeline needs are provided: dtype
//! inspection, moving a column into the index, and casting `object` columns
//! to `category`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{FrameError, Result};

/// Storage dtype of a column, named after its pandas counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float64,
    Int64,
    Bool,
    Object,
    Category,
}

impl DType {
    pub fn name(&self) -> &'static str {
        match self {
            DType::Float64 => "float64",
            DType::Int64 => "int64",
            DType::Bool => "bool",
            DType::Object => "object",
            DType::Category => "category",
        }
    }

    /// `object` and `category` columns hold discrete labels.
    pub fn is_categorical(&self) -> bool {
        matches!(self, DType::Object | DType::Category)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed column storage. Missing labels are `None`, missing floats are NaN.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Float64(Vec<f64>),
    Int64(Vec<i64>),
    Bool(Vec<bool>),
    Object(Vec<Option<String>>),
    Category(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float64(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Object(v) | ColumnData::Category(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            ColumnData::Float64(_) => DType::Float64,
            ColumnData::Int64(_) => DType::Int64,
            ColumnData::Bool(_) => DType::Bool,
            ColumnData::Object(_) => DType::Object,
            ColumnData::Category(_) => DType::Category,
        }
    }
}

/// A named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn float(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, ColumnData::Float64(values))
    }

    pub fn int(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self::new(name, ColumnData::Int64(values))
    }

    pub fn bool(name: impl Into<String>, values: Vec<bool>) -> Self {
        Self::new(name, ColumnData::Bool(values))
    }

    pub fn object<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        Self::new(
            name,
            ColumnData::Object(values.into_iter().map(|v| v.map(Into::into)).collect()),
        )
    }

    pub fn category<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        Self::new(
            name,
            ColumnData::Category(values.into_iter().map(|v| v.map(Into::into)).collect()),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Numeric view of the column. Labels are rejected.
    pub fn to_f64(&self) -> Result<Vec<f64>> {
        match &self.data {
            ColumnData::Float64(v) => Ok(v.clone()),
            ColumnData::Int64(v) => Ok(v.iter().map(|&x| x as f64).collect()),
            ColumnData::Bool(v) => Ok(v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect()),
            ColumnData::Object(_) | ColumnData::Category(_) => Err(FrameError::InvalidDtype {
                name: self.name.clone(),
                actual: self.dtype().to_string(),
                expected: "a numeric dtype".to_string(),
            }),
        }
    }

    /// Render every cell as a string label. Missing labels and NaN become "".
    pub fn to_labels(&self) -> Vec<String> {
        match &self.data {
            ColumnData::Float64(v) => v.iter().map(|&x| format_float(x)).collect(),
            ColumnData::Int64(v) => v.iter().map(|x| x.to_string()).collect(),
            ColumnData::Bool(v) => v.iter().map(|x| x.to_string()).collect(),
            ColumnData::Object(v) | ColumnData::Category(v) => {
                v.iter().map(|x| x.clone().unwrap_or_default()).collect()
            }
        }
    }
}

/// Shortest round-trip rendering, empty for NaN.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

/// Named row index holding string labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    name: String,
    labels: Vec<String>,
}

impl Index {
    pub fn new(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            labels,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Ordered collection of equally long named columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataFrame {
    columns: Vec<Column>,
    index: Option<Index>,
    n_rows: usize,
}

impl DataFrame {
    /// Build a frame, rejecting duplicate names and ragged columns.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(Column::len).unwrap_or(0);

        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(FrameError::DuplicateColumn(column.name.clone()));
            }
            if column.len() != n_rows {
                return Err(FrameError::LengthMismatch {
                    name: column.name.clone(),
                    expected: n_rows,
                    got: column.len(),
                });
            }
        }

        Ok(Self {
            columns,
            index: None,
            n_rows,
        })
    }

    /// Attach an index; its length must match the row count.
    pub fn with_index(mut self, index: Index) -> Result<Self> {
        if !self.columns.is_empty() && index.len() != self.n_rows {
            return Err(FrameError::LengthMismatch {
                name: index.name.clone(),
                expected: self.n_rows,
                got: index.len(),
            });
        }
        self.n_rows = index.len();
        self.index = Some(index);
        Ok(self)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn dtypes(&self) -> Vec<(String, DType)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.dtype()))
            .collect()
    }

    pub fn index(&self) -> Option<&Index> {
        self.index.as_ref()
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index.as_ref().map(Index::name)
    }

    /// Remove a column and return it.
    pub fn pop(&mut self, name: &str) -> Result<Column> {
        let pos = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_string()))?;
        Ok(self.columns.remove(pos))
    }

    /// Move a column into the index, replacing any existing index.
    pub fn set_index(&mut self, name: &str) -> Result<()> {
        let column = self.pop(name)?;
        self.index = Some(Index::new(column.name.clone(), column.to_labels()));
        Ok(())
    }

    /// Cast an `object` column to `category`. Category columns are left alone.
    pub fn astype_category(&mut self, name: &str) -> Result<()> {
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_string()))?;

        let data = std::mem::replace(&mut column.data, ColumnData::Bool(Vec::new()));
        column.data = match data {
            ColumnData::Object(values) | ColumnData::Category(values) => {
                ColumnData::Category(values)
            }
            other => {
                let actual = other.dtype().to_string();
                column.data = other;
                return Err(FrameError::InvalidDtype {
                    name: name.to_string(),
                    actual,
                    expected: DType::Object.to_string(),
                });
            }
        };
        Ok(())
    }
}
