//! CSV and JSON persistence for frames
//!
//! Reading infers one dtype per column the way pandas does for the common
//! cases: integers, floats (empty cells become NaN), booleans and free text.

use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::errors::Result;
use crate::frame::{Column, ColumnData, DataFrame};

impl DataFrame {
    /// Load a CSV file with a header row.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

        for record in reader.records() {
            let record = record?;
            for (i, cell) in record.iter().enumerate().take(headers.len()) {
                cells[i].push(cell.trim().to_string());
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| Column::new(name, infer_column(raw)))
            .collect();

        let frame = DataFrame::new(columns)?;
        debug!(
            "Loaded {} rows x {} columns from {}",
            frame.n_rows(),
            frame.n_columns(),
            path.display()
        );
        Ok(frame)
    }

    /// Write the frame as CSV. The index, when present and requested, comes first.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P, write_index: bool) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        let index = self.index().filter(|_| write_index);

        let mut header: Vec<String> = Vec::with_capacity(self.n_columns() + 1);
        if let Some(index) = index {
            header.push(index.name().to_string());
        }
        header.extend(self.column_names());
        writer.write_record(&header)?;

        let rendered: Vec<Vec<String>> = self.columns().iter().map(Column::to_labels).collect();
        for row in 0..self.n_rows() {
            let mut record: Vec<&str> = Vec::with_capacity(header.len());
            if let Some(index) = index {
                record.push(&index.labels()[row]);
            }
            record.extend(rendered.iter().map(|col| col[row].as_str()));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Write the frame as a JSON array of records (index not included).
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut records = Vec::with_capacity(self.n_rows());
        for row in 0..self.n_rows() {
            let mut record = Map::new();
            for column in self.columns() {
                record.insert(column.name().to_string(), cell_value(column.data(), row));
            }
            records.push(Value::Object(record));
        }

        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(&mut writer, &Value::Array(records))?;
        writer.flush()?;
        Ok(())
    }
}

fn cell_value(data: &ColumnData, row: usize) -> Value {
    match data {
        ColumnData::Float64(v) => serde_json::Number::from_f64(v[row])
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ColumnData::Int64(v) => Value::from(v[row]),
        ColumnData::Bool(v) => Value::Bool(v[row]),
        ColumnData::Object(v) | ColumnData::Category(v) => v[row]
            .as_ref()
            .map(|s| Value::String(s.clone()))
            .unwrap_or(Value::Null),
    }
}

/// Pick the narrowest dtype that represents every non-empty cell.
fn infer_column(raw: Vec<String>) -> ColumnData {
    let present: Vec<&str> = raw
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    let has_missing = present.len() != raw.len();

    if !has_missing && !present.is_empty() {
        let ints: Option<Vec<i64>> = present.iter().map(|s| s.parse::<i64>().ok()).collect();
        if let Some(ints) = ints {
            return ColumnData::Int64(ints);
        }
    }

    if present.iter().all(|s| s.parse::<f64>().is_ok()) {
        let floats = raw
            .iter()
            .map(|s| s.parse::<f64>().unwrap_or(f64::NAN))
            .collect();
        return ColumnData::Float64(floats);
    }

    if !has_missing && present.iter().all(|s| parse_bool(s).is_some()) {
        return ColumnData::Bool(present.iter().filter_map(|s| parse_bool(s)).collect());
    }

    ColumnData::Object(
        raw.into_iter()
            .map(|s| if s.is_empty() { None } else { Some(s) })
            .collect(),
    )
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::DType;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_infer_int() {
        assert_eq!(
            infer_column(strings(&["1", "2", "-3"])),
            ColumnData::Int64(vec![1, 2, -3])
        );
    }

    #[test]
    fn test_infer_int_with_missing_becomes_float() {
        match infer_column(strings(&["1", "", "3"])) {
            ColumnData::Float64(v) => {
                assert_eq!(v[0], 1.0);
                assert!(v[1].is_nan());
                assert_eq!(v[2], 3.0);
            }
            other => panic!("unexpected {:?}", other.dtype()),
        }
    }

    #[test]
    fn test_infer_bool_and_object() {
        assert_eq!(infer_column(strings(&["true", "False"])).dtype(), DType::Bool);
        assert_eq!(
            infer_column(strings(&["a", "", "b"])),
            ColumnData::Object(vec![Some("a".into()), None, Some("b".into())])
        );
    }

    #[test]
    fn test_all_missing_is_float() {
        assert_eq!(infer_column(strings(&["", ""])).dtype(), DType::Float64);
    }
}
