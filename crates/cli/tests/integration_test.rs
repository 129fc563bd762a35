//! Config-driven runs against CSV files on disk

use foldboost_cli::{run, show_model, ExperimentConfig};
use foldboost_gbdt::Backend;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_csv(path: &Path, n: usize, offset: usize, with_target: bool) {
    let mut text = String::from(if with_target {
        "id,x,shop,user,target\n"
    } else {
        "id,x,shop,user\n"
    });
    for i in 0..n {
        let x = ((i * 37 + offset) % 100) as f64 / 100.0;
        let shop = ["north", "south", "east"][i % 3];
        write!(text, "{},{},{},u{}", i + offset, x, shop, i % 10).unwrap();
        if with_target {
            write!(text, ",{}", if x > 0.5 { 1 } else { 0 }).unwrap();
        }
        text.push('\n');
    }
    fs::write(path, text).unwrap();
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("exp.toml");
    let text = format!(
        "logging_directory = \"{}\"\ntrain_path = \"train.csv\"\ntarget_column = \"target\"\n{}",
        dir.join("out").display(),
        body
    );
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_run_and_show_model() {
    let dir = tempdir().unwrap();
    write_csv(&dir.path().join("train.csv"), 150, 0, true);
    write_csv(&dir.path().join("test.csv"), 20, 500, false);
    let path = write_config(
        dir.path(),
        "test_path = \"test.csv\"\ncategory_columns = [\"shop\"]\n\n\
         [model_params]\nn_estimators = 20\nmin_child_samples = 5\n\n\
         [cv]\nn_splits = 3\ngroup_column = \"user\"\nshuffle = false\n",
    );

    let config = ExperimentConfig::load(&path).unwrap();
    assert!(config.validate().unwrap().is_empty());
    let result = run(&config, false).unwrap();

    assert_eq!(result.models.len(), 3);
    assert_eq!(result.scores.len(), 4);
    assert_eq!(result.oof_prediction.len(), 150);

    let out = dir.path().join("out");
    let log = fs::read_to_string(out.join("log.txt")).unwrap();
    assert!(log.contains("Categorical: [\"shop\"]"));
    assert!(log.contains("Features: [\"x\", \"shop\"]"));
    assert!(out.join("submission.csv").exists());

    let summary = show_model("lgbm", &out.join("models").join("fold1")).unwrap();
    assert_eq!(summary.backend, Backend::Lgbm);
    assert_eq!(summary.feature_names, vec!["x", "shop"]);
    assert!(summary.num_trees > 0);
    assert_eq!(summary.digest.len(), 64);

    assert!(show_model("cat", &out.join("models").join("fold1")).is_err());
}

#[test]
fn test_overwrite_flag() {
    let dir = tempdir().unwrap();
    write_csv(&dir.path().join("train.csv"), 90, 0, true);
    let path = write_config(
        dir.path(),
        "gbdt_type = \"cat\"\n\n[model_params]\niterations = 10\ndepth = 3\n",
    );
    let config = ExperimentConfig::load(&path).unwrap();

    run(&config, false).unwrap();
    assert!(run(&config, false).is_err());
    let result = run(&config, true).unwrap();
    assert_eq!(result.models.len(), 5);

    let summary = show_model("cat", &dir.path().join("out").join("models").join("fold5")).unwrap();
    assert_eq!(summary.backend, Backend::Cat);
}

#[test]
fn test_missing_target_column() {
    let dir = tempdir().unwrap();
    write_csv(&dir.path().join("train.csv"), 30, 0, false);
    let path = write_config(dir.path(), "");
    let config = ExperimentConfig::load(&path).unwrap();
    let err = run(&config, false).unwrap_err();
    assert!(format!("{:#}", err).contains("target"));
}
