//! Feature-importance aggregation and bar chart

use std::collections::BTreeMap;
use std::path::Path;

use foldboost_gbdt::FeatureImportance;

use crate::errors::{ExperimentError, Result};

const WIDTH: u32 = 800;
const ROW_HEIGHT: u32 = 24;
const MARGIN: u32 = 20;

/// Average importance per feature over all fold tables.
///
/// One row per distinct feature, sorted by descending mean with ties
/// broken by feature name.
pub fn aggregate_importance(tables: &[Vec<FeatureImportance>]) -> Vec<FeatureImportance> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for row in tables.iter().flatten() {
        let entry = sums.entry(row.feature.as_str()).or_insert((0.0, 0));
        entry.0 += row.importance;
        entry.1 += 1;
    }

    let mut out: Vec<FeatureImportance> = sums
        .into_iter()
        .map(|(feature, (sum, count))| FeatureImportance {
            feature: feature.to_string(),
            importance: sum / count as f64,
        })
        .collect();
    out.sort_by(|a, b| {
        b.importance
            .total_cmp(&a.importance)
            .then_with(|| a.feature.cmp(&b.feature))
    });
    out
}

/// Render the top `max_features` rows as a horizontal bar chart PNG.
///
/// Bars are unlabeled and follow the row order of `table`, largest first.
pub fn plot_importance<P: AsRef<Path>>(
    table: &[FeatureImportance],
    path: P,
    max_features: usize,
) -> Result<()> {
    use plotters::prelude::*;

    let rows = &table[..table.len().min(max_features)];
    let height = MARGIN * 2 + ROW_HEIGHT * rows.len().max(1) as u32;
    let max_value = rows
        .iter()
        .map(|r| r.importance)
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    let bar_span = (WIDTH - MARGIN * 2) as f64;

    let mut buf = vec![0u8; (WIDTH * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (WIDTH, height)).into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| ExperimentError::Plot(e.to_string()))?;

        for (i, row) in rows.iter().enumerate() {
            let top = (MARGIN + ROW_HEIGHT * i as u32) as i32;
            let left = MARGIN as i32;
            let length = if max_value > 0.0 && row.importance.is_finite() {
                (row.importance.max(0.0) / max_value * bar_span) as i32
            } else {
                0
            };
            let bar = Rectangle::new(
                [(left, top + 3), (left + length.max(1), top + ROW_HEIGHT as i32 - 3)],
                RGBColor(31, 119, 180).filled(),
            );
            root.draw(&bar)
                .map_err(|e| ExperimentError::Plot(e.to_string()))?;
        }
        root.present()
            .map_err(|e| ExperimentError::Plot(e.to_string()))?;
    }

    image::save_buffer(path.as_ref(), &buf, WIDTH, height, image::ColorType::Rgb8)
        .map_err(|e| ExperimentError::Plot(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fi(feature: &str, importance: f64) -> FeatureImportance {
        FeatureImportance {
            feature: feature.to_string(),
            importance,
        }
    }

    #[test]
    fn test_mean_and_order() {
        let tables = vec![
            vec![fi("a", 1.0), fi("b", 4.0), fi("c", 2.0)],
            vec![fi("a", 3.0), fi("b", 0.0), fi("c", 2.0)],
        ];
        let out = aggregate_importance(&tables);
        let names: Vec<&str> = out.iter().map(|r| r.feature.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(out[0].importance, 2.0);
    }

    #[test]
    fn test_empty_tables() {
        assert!(aggregate_importance(&[]).is_empty());
    }

    #[test]
    fn test_plot_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("importance.png");
        let table = vec![fi("x", 3.0), fi("y", 1.0), fi("z", 0.0)];
        plot_importance(&table, &path, 2).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn test_plot_many_long_named_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("importance.png");
        let table: Vec<FeatureImportance> = (0..60)
            .map(|i| fi(&format!("a_rather_long_feature_name_number_{}", i), (60 - i) as f64))
            .chain([fi("nan", f64::NAN), fi("negative", -1.0)])
            .collect();
        plot_importance(&table, &path, 100).unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), WIDTH);
        assert_eq!(img.height(), MARGIN * 2 + ROW_HEIGHT * 62);
    }

    #[test]
    fn test_plot_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("importance.png");
        plot_importance(&[], &path, 10).unwrap();
        assert!(path.exists());
    }

    proptest! {
        #[test]
        fn aggregated_rows_are_unique_and_sorted(
            folds in prop::collection::vec(
                prop::collection::vec((0u8..8, 0.0f64..100.0), 0..8),
                1..6,
            )
        ) {
            let tables: Vec<Vec<FeatureImportance>> = folds
                .iter()
                .map(|t| t.iter().map(|(f, v)| fi(&format!("f{}", f), *v)).collect())
                .collect();
            let out = aggregate_importance(&tables);

            let mut names: Vec<&str> = out.iter().map(|r| r.feature.as_str()).collect();
            let n = names.len();
            names.sort_unstable();
            names.dedup();
            prop_assert_eq!(names.len(), n);

            let distinct: std::collections::BTreeSet<u8> =
                folds.iter().flatten().map(|(f, _)| *f).collect();
            prop_assert_eq!(n, distinct.len());

            for pair in out.windows(2) {
                prop_assert!(pair[0].importance >= pair[1].importance);
            }
        }
    }
}
