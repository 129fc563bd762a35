//! Model-facing feature matrix
//!
//! Column-major `f64` storage. Frames are encoded with one shared category
//! dictionary per label column so that train and test codes agree: codes are
//! the positions of the sorted distinct training labels, and labels never seen
//! in training (or missing) become NaN.

use foldboost_frame::{Column, ColumnData, DataFrame};
use std::collections::BTreeMap;

use crate::errors::{GbdtError, Result};

/// Dense feature matrix with named columns
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Build from named columns of equal length.
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(GbdtError::InvalidData(format!(
                "{} names for {} columns",
                names.len(),
                columns.len()
            )));
        }

        let n_rows = columns.first().map(Vec::len).unwrap_or(0);
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != n_rows {
                return Err(GbdtError::InvalidData(format!(
                    "column {} has {} rows, expected {}",
                    name,
                    column.len(),
                    n_rows
                )));
            }
        }

        Ok(Self {
            names,
            columns,
            n_rows,
        })
    }

    /// Build from row-major data.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let n_features = names.len();
        let mut columns = vec![Vec::with_capacity(rows.len()); n_features];

        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(GbdtError::InvalidData(format!(
                    "row {}: expected {} features, got {}",
                    i,
                    n_features,
                    row.len()
                )));
            }
            for (column, &value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        let mut matrix = Self::new(names, columns)?;
        matrix.n_rows = rows.len();
        Ok(matrix)
    }

    /// Encode a training frame and an optional test frame with shared category codes.
    pub fn from_frames(
        train: &DataFrame,
        test: Option<&DataFrame>,
    ) -> Result<(FeatureMatrix, Option<FeatureMatrix>)> {
        let mut names = Vec::with_capacity(train.n_columns());
        let mut train_columns = Vec::with_capacity(train.n_columns());
        let mut test_columns = Vec::with_capacity(train.n_columns());

        for column in train.columns() {
            let test_column = match test {
                Some(frame) => Some(frame.column(column.name()).ok_or_else(|| {
                    GbdtError::InvalidData(format!(
                        "test frame has no column {}",
                        column.name()
                    ))
                })?),
                None => None,
            };

            if column.dtype().is_categorical() {
                let dictionary = CategoryDictionary::fit(&label_cells(column));
                train_columns.push(dictionary.encode(&label_cells(column)));
                if let Some(test_column) = test_column {
                    test_columns.push(dictionary.encode(&label_cells(test_column)));
                }
            } else {
                train_columns.push(column.to_f64()?);
                if let Some(test_column) = test_column {
                    test_columns.push(test_column.to_f64()?);
                }
            }
            names.push(column.name().to_string());
        }

        let train_matrix = Self::with_rows(names.clone(), train_columns, train.n_rows())?;
        let test_matrix = match test {
            Some(frame) => Some(Self::with_rows(names, test_columns, frame.n_rows())?),
            None => None,
        };

        Ok((train_matrix, test_matrix))
    }

    fn with_rows(names: Vec<String>, columns: Vec<Vec<f64>>, n_rows: usize) -> Result<Self> {
        let mut matrix = Self::new(names, columns)?;
        matrix.n_rows = n_rows;
        Ok(matrix)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, feature: usize) -> &[f64] {
        &self.columns[feature]
    }

    #[inline]
    pub fn value(&self, row: usize, feature: usize) -> f64 {
        self.columns[feature][row]
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[row]).collect()
    }

    /// Copy the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> FeatureMatrix {
        let columns = self
            .columns
            .iter()
            .map(|c| rows.iter().map(|&r| c[r]).collect())
            .collect();
        FeatureMatrix {
            names: self.names.clone(),
            columns,
            n_rows: rows.len(),
        }
    }

    /// Replace one column, keeping its name.
    pub(crate) fn with_column(&self, feature: usize, values: Vec<f64>) -> FeatureMatrix {
        let mut matrix = self.clone();
        matrix.columns[feature] = values;
        matrix
    }

    /// Min and max of every feature, ignoring NaN.
    pub fn feature_stats(&self) -> Vec<(f64, f64)> {
        self.columns
            .iter()
            .map(|c| {
                c.iter()
                    .filter(|v| !v.is_nan())
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    })
            })
            .collect()
    }
}

fn label_cells(column: &Column) -> Vec<Option<String>> {
    match column.data() {
        ColumnData::Object(values) | ColumnData::Category(values) => values.clone(),
        ColumnData::Float64(values) => values
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(v.to_string()) })
            .collect(),
        _ => column.to_labels().into_iter().map(Some).collect(),
    }
}

/// Sorted label dictionary of one training column
struct CategoryDictionary {
    codes: BTreeMap<String, usize>,
}

impl CategoryDictionary {
    fn fit(labels: &[Option<String>]) -> Self {
        let mut codes: BTreeMap<String, usize> = labels
            .iter()
            .flatten()
            .map(|label| (label.clone(), 0))
            .collect();
        for (code, slot) in codes.values_mut().enumerate() {
            *slot = code;
        }
        Self { codes }
    }

    fn encode(&self, labels: &[Option<String>]) -> Vec<f64> {
        labels
            .iter()
            .map(|label| {
                label
                    .as_ref()
                    .and_then(|l| self.codes.get(l))
                    .map(|&code| code as f64)
                    .unwrap_or(f64::NAN)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_rows() {
        let m = FeatureMatrix::from_rows(names(&["a", "b"]), &[vec![1.0, 2.0], vec![3.0, 4.0]])
            .unwrap();
        assert_eq!(m.n_rows(), 2);
        assert_eq!(m.column(1), &[2.0, 4.0]);
        assert_eq!(m.row(1), vec![3.0, 4.0]);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        assert!(FeatureMatrix::from_rows(names(&["a", "b"]), &[vec![1.0]]).is_err());
    }

    #[test]
    fn test_take_rows() {
        let m = FeatureMatrix::new(names(&["a"]), vec![vec![10.0, 20.0, 30.0]]).unwrap();
        let sub = m.take_rows(&[2, 0]);
        assert_eq!(sub.column(0), &[30.0, 10.0]);
        assert_eq!(sub.n_rows(), 2);
    }

    #[test]
    fn test_shared_category_codes() {
        let train = DataFrame::new(vec![
            Column::float("x", vec![1.0, 2.0, 3.0]),
            Column::object("c", vec![Some("b"), Some("a"), None]),
        ])
        .unwrap();
        let test = DataFrame::new(vec![
            Column::float("x", vec![4.0, 5.0]),
            Column::object("c", vec![Some("a"), Some("z")]),
        ])
        .unwrap();

        let (train_m, test_m) = FeatureMatrix::from_frames(&train, Some(&test)).unwrap();
        let test_m = test_m.unwrap();

        assert_eq!(train_m.feature_names(), &["x", "c"]);
        assert_eq!(train_m.column(1)[0], 1.0);
        assert_eq!(train_m.column(1)[1], 0.0);
        assert!(train_m.column(1)[2].is_nan());
        assert_eq!(test_m.column(1)[0], 0.0);
        assert!(test_m.column(1)[1].is_nan());
    }

    #[test]
    fn test_missing_test_column() {
        let train = DataFrame::new(vec![Column::float("x", vec![1.0])]).unwrap();
        let test = DataFrame::new(vec![Column::float("y", vec![1.0])]).unwrap();
        assert!(FeatureMatrix::from_frames(&train, Some(&test)).is_err());
    }

    #[test]
    fn test_feature_stats_skip_nan() {
        let m = FeatureMatrix::new(names(&["a"]), vec![vec![3.0, f64::NAN, -1.0]]).unwrap();
        assert_eq!(m.feature_stats(), vec![(-1.0, 3.0)]);
    }
}
