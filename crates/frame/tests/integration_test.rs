//! File-level tests for frame persistence

use foldboost_frame::{read_npy, write_npy, Column, DType, DataFrame};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

fn create_csv() -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "id,age,income,city,member")?;
    writeln!(file, "1,34,1200.5,tokyo,true")?;
    writeln!(file, "2,51,,osaka,false")?;
    writeln!(file, "3,29,980.0,,true")?;
    file.flush()?;
    Ok(file)
}

#[test]
fn test_read_csv_infers_dtypes() {
    let file = create_csv().unwrap();
    let df = DataFrame::read_csv(file.path()).unwrap();

    assert_eq!(df.n_rows(), 3);
    let dtypes: Vec<DType> = df.dtypes().into_iter().map(|(_, d)| d).collect();
    assert_eq!(
        dtypes,
        vec![
            DType::Int64,
            DType::Int64,
            DType::Float64,
            DType::Object,
            DType::Bool
        ]
    );

    let income = df.column("income").unwrap().to_f64().unwrap();
    assert!(income[1].is_nan());
}

#[test]
fn test_write_csv_with_index() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("submission.csv");

    let mut df = DataFrame::new(vec![
        Column::int("id", vec![7, 8]),
        Column::float("target", vec![0.25, 0.75]),
    ])
    .unwrap();
    df.write_csv(&path, true).unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "id,target\n7,0.25\n8,0.75\n"
    );

    df.set_index("id").unwrap();
    df.write_csv(&path, true).unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "id,target\n7,0.25\n8,0.75\n"
    );

    df.write_csv(&path, false).unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "target\n0.25\n0.75\n"
    );
}

#[test]
fn test_write_json_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frame.json");

    let df = DataFrame::new(vec![
        Column::float("x", vec![1.5, f64::NAN]),
        Column::object("c", vec![Some("a"), None]),
    ])
    .unwrap();
    df.write_json(&path).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value[0]["x"], 1.5);
    assert!(value[1]["x"].is_null());
    assert_eq!(value[0]["c"], "a");
    assert!(value[1]["c"].is_null());
}

#[test]
fn test_npy_file_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("oof_prediction.npy");

    let values = vec![0.1, 0.2, 0.3, 0.4];
    write_npy(&path, &values).unwrap();
    assert_eq!(read_npy(&path).unwrap(), values);
}
