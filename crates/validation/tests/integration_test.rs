//! Splitter properties and fold-wise training

use foldboost_gbdt::{FeatureMatrix, FitParams, Metric, ModelKind, ModelParams};
use foldboost_validation::{
    check_cv, cross_validate, CvSplitter, CvStrategy, Fold, FoldLogger, GroupKFold, KFold,
    StratifiedKFold, ValidationError,
};
use proptest::prelude::*;
use std::cell::RefCell;

#[derive(Default)]
struct RecordingLogger {
    lines: RefCell<Vec<String>>,
}

impl FoldLogger for RecordingLogger {
    fn log(&self, message: &str) {
        self.lines.borrow_mut().push(message.to_string());
    }
}

fn validated_once(folds: &[Fold], n_rows: usize) -> bool {
    let mut seen = vec![0usize; n_rows];
    for fold in folds {
        for &r in &fold.valid {
            seen[r] += 1;
        }
        if fold.train.iter().any(|t| fold.valid.binary_search(t).is_ok()) {
            return false;
        }
        if fold.train.len() + fold.valid.len() != n_rows {
            return false;
        }
    }
    seen.into_iter().all(|c| c == 1)
}

fn data(n: usize) -> (FeatureMatrix, Vec<f64>) {
    let a: Vec<f64> = (0..n).map(|i| ((i * 31) % 97) as f64).collect();
    let b: Vec<f64> = (0..n).map(|i| ((i * 17) % 13) as f64).collect();
    let y: Vec<f64> = a.iter().map(|&v| if v > 48.0 { 1.0 } else { 0.0 }).collect();
    let x = FeatureMatrix::new(vec!["a".into(), "b".into()], vec![a, b]).unwrap();
    (x, y)
}

fn models(kind: ModelKind, n: usize) -> Vec<Box<dyn foldboost_gbdt::Estimator>> {
    let params = ModelParams::new()
        .with("n_estimators", 20)
        .with("min_child_samples", 3);
    (0..n).map(|_| kind.build(&params).unwrap()).collect()
}

proptest! {
    #[test]
    fn kfold_partitions_rows(n_rows in 10usize..200, k in 2usize..10, shuffle: bool, seed: u64) {
        let folds = KFold::new(k, shuffle, seed).split(n_rows, &[], None).unwrap();
        prop_assert_eq!(folds.len(), k);
        prop_assert!(validated_once(&folds, n_rows));
    }

    #[test]
    fn stratified_keeps_class_counts_within_one(
        labels in prop::collection::vec(0u8..3, 20..150),
        k in 2usize..6,
        seed: u64,
    ) {
        let y: Vec<f64> = labels.iter().map(|&l| l as f64).collect();
        let folds = StratifiedKFold::new(k, true, seed).split(y.len(), &y, None).unwrap();
        prop_assert!(validated_once(&folds, y.len()));
        for class in 0..3u8 {
            let counts: Vec<usize> = folds
                .iter()
                .map(|f| f.valid.iter().filter(|&&r| labels[r] == class).count())
                .collect();
            let max = counts.iter().max().copied().unwrap_or(0);
            let min = counts.iter().min().copied().unwrap_or(0);
            prop_assert!(max - min <= 1);
        }
    }

    #[test]
    fn group_folds_never_split_a_group(group_ids in prop::collection::vec(0u8..12, 30..120)) {
        let groups: Vec<String> = group_ids.iter().map(|g| format!("g{}", g)).collect();
        let distinct = {
            let mut ids = group_ids.clone();
            ids.sort_unstable();
            ids.dedup();
            ids.len()
        };
        prop_assume!(distinct >= 3);
        let folds = GroupKFold::new(3).split(groups.len(), &[], Some(&groups)).unwrap();
        prop_assert!(validated_once(&folds, groups.len()));
        for fold in &folds {
            for &v in &fold.valid {
                prop_assert!(fold.train.iter().all(|&t| groups[t] != groups[v]));
            }
        }
    }
}

#[test]
fn test_cross_validate_produces_scores_and_predictions() {
    let (x, y) = data(120);
    let (x_test, _) = data(30);
    let cv = check_cv(CvStrategy::NFolds(4), &y, false, 0).unwrap();
    let mut fold_models = models(ModelKind::LgbmClassifier, 4);
    let logger = RecordingLogger::default();
    let metric = Metric::roc_auc();

    let result = cross_validate(
        &mut fold_models,
        &x,
        &y,
        Some(&x_test),
        cv.as_ref(),
        None,
        &logger,
        Some(&metric),
        &FitParams::new(),
    )
    .unwrap();

    assert_eq!(result.oof_prediction.len(), 120);
    assert_eq!(result.test_prediction.as_ref().map(Vec::len), Some(30));
    assert_eq!(result.scores.len(), 5);
    assert!(result.scores[4] > 0.9);
    assert_eq!(result.importance.len(), 4);
    assert!(fold_models.iter().all(|m| m.booster().is_some()));

    let lines = logger.lines.borrow();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("Fold 1 score: "));
    assert!(lines[4].starts_with("Overall score: "));
}

#[test]
fn test_cross_validate_without_metric_or_test() {
    let (x, y) = data(60);
    let cv = KFold::new(3, false, 0);
    let mut fold_models = models(ModelKind::LgbmRegressor, 3);
    let logger = RecordingLogger::default();

    let result = cross_validate(
        &mut fold_models,
        &x,
        &y,
        None,
        &cv,
        None,
        &logger,
        None,
        &FitParams::new(),
    )
    .unwrap();

    assert!(result.scores.is_empty());
    assert!(result.test_prediction.is_none());
    assert!(logger.lines.borrow().is_empty());
}

#[test]
fn test_model_count_must_match_folds() {
    let (x, y) = data(30);
    let cv = KFold::new(3, false, 0);
    let mut fold_models = models(ModelKind::LgbmRegressor, 2);

    let err = cross_validate(
        &mut fold_models,
        &x,
        &y,
        None,
        &cv,
        None,
        &RecordingLogger::default(),
        None,
        &FitParams::new(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::FoldCountMismatch { models: 2, folds: 3 }
    ));
}
