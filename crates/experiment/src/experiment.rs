//! Scoped logging directory for one run
//!
//! An `Experiment` owns its directory for its whole lifetime: the directory is
//! locked at open and unlocked when the value is finished or dropped. Dropping
//! without `finish` marks the tracking run as failed.

use fs2::FileExt;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use foldboost_frame::{write_npy, DataFrame};
use foldboost_validation::FoldLogger;

use crate::errors::{ExperimentError, Result};
use crate::tracking::{RunStatus, TrackingOptions, TrackingRun};

pub const LOCK_FILENAME: &str = ".foldboost.lock";
pub const LOG_FILENAME: &str = "log.txt";
pub const PARAMS_FILENAME: &str = "params.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentOptions {
    pub overwrite: bool,
    pub metrics_filename: String,
    pub tracking: Option<TrackingOptions>,
}

impl Default for ExperimentOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            metrics_filename: "metrics.txt".to_string(),
            tracking: None,
        }
    }
}

/// On-disk format of `log_dataframe`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Json,
}

/// Exclusive lock on a logging directory
struct DirLock {
    path: PathBuf,
    file: File,
}

impl DirLock {
    fn acquire(dir: &Path) -> Result<Self> {
        let lock_path = dir.join(LOCK_FILENAME);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(ExperimentError::DirectoryLocked(dir.to_path_buf()));
        }

        file.set_len(0)?;
        writeln!(
            file,
            "pid={};started={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )?;

        Ok(Self {
            path: lock_path,
            file,
        })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = fs::remove_file(&self.path);
    }
}

pub struct Experiment {
    logging_directory: PathBuf,
    log_file: Mutex<BufWriter<File>>,
    metrics_file: Mutex<BufWriter<File>>,
    params: Mutex<Map<String, Value>>,
    tracking: Mutex<Option<TrackingRun>>,
    closed: bool,
    _lock: DirLock,
}

impl std::fmt::Debug for Experiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiment")
            .field("logging_directory", &self.logging_directory)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Experiment {
    /// Create (or, with `overwrite`, empty) the directory and take its lock.
    pub fn open<P: AsRef<Path>>(logging_directory: P, options: ExperimentOptions) -> Result<Self> {
        let dir = logging_directory.as_ref().to_path_buf();
        let existed = dir.exists();
        if existed && !options.overwrite {
            return Err(ExperimentError::DirectoryExists(dir));
        }
        fs::create_dir_all(&dir)?;

        let lock = DirLock::acquire(&dir)?;
        if existed {
            clear_directory(&dir)?;
        }

        let log_file = File::create(dir.join(LOG_FILENAME))?;
        let metrics_file = File::create(dir.join(&options.metrics_filename))?;

        let tracking = match &options.tracking {
            Some(tracking) => Some(TrackingRun::start(tracking, &dir.display().to_string())?),
            None => None,
        };

        Ok(Self {
            logging_directory: dir,
            log_file: Mutex::new(BufWriter::new(log_file)),
            metrics_file: Mutex::new(BufWriter::new(metrics_file)),
            params: Mutex::new(Map::new()),
            tracking: Mutex::new(tracking),
            closed: false,
            _lock: lock,
        })
    }

    pub fn logging_directory(&self) -> &Path {
        &self.logging_directory
    }

    /// Id of the tracking run, when tracking is enabled
    pub fn run_id(&self) -> Option<String> {
        self.tracking.lock().as_ref().map(|run| run.run_id().to_string())
    }

    /// Append a line to `log.txt` and emit it as a tracing event.
    pub fn log(&self, text: &str) {
        info!("{}", text);
        let mut file = self.log_file.lock();
        if let Err(err) = writeln!(file, "{}", text).and_then(|_| file.flush()) {
            warn!("failed to write {}: {}", LOG_FILENAME, err);
        }
    }

    /// Append `name,value` to the metrics file.
    pub fn log_metric(&self, name: &str, value: f64) -> Result<()> {
        {
            let mut file = self.metrics_file.lock();
            writeln!(file, "{},{}", name, value)?;
            file.flush()?;
        }
        if let Some(run) = self.tracking.lock().as_mut() {
            run.log_metric(name, value)?;
        }
        Ok(())
    }

    pub fn log_param(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Some(run) = self.tracking.lock().as_mut() {
            let text = match &value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            run.log_param(name, &text)?;
        }
        self.params.lock().insert(name.to_string(), value);
        Ok(())
    }

    pub fn log_params(&self, params: &Map<String, Value>) -> Result<()> {
        for (name, value) in params {
            self.log_param(name, value.clone())?;
        }
        Ok(())
    }

    /// Save `<dir>/<name>.npy`.
    pub fn log_numpy(&self, name: &str, array: &[f64]) -> Result<PathBuf> {
        let path = self.logging_directory.join(format!("{}.npy", name));
        write_npy(&path, array)?;
        self.forward_artifact(&path)?;
        Ok(path)
    }

    /// Save `<dir>/<name>` without the index.
    pub fn log_dataframe(&self, name: &str, df: &DataFrame, format: DataFormat) -> Result<PathBuf> {
        let path = self.logging_directory.join(name);
        match format {
            DataFormat::Csv => df.write_csv(&path, false)?,
            DataFormat::Json => df.write_json(&path)?,
        }
        self.forward_artifact(&path)?;
        Ok(path)
    }

    /// Copy a file into the tracking run's artifacts.
    pub fn log_artifact<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.forward_artifact(path.as_ref())
    }

    fn forward_artifact(&self, path: &Path) -> Result<()> {
        if let Some(run) = self.tracking.lock().as_mut() {
            run.log_artifact(path)?;
        }
        Ok(())
    }

    /// Handle passed to fold-wise training.
    pub fn logger(&self) -> ExperimentLogger<'_> {
        ExperimentLogger { experiment: self }
    }

    /// Flush everything and mark the tracking run finished.
    pub fn finish(mut self) -> Result<()> {
        self.close(RunStatus::Finished)
    }

    fn close(&mut self, status: RunStatus) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.log_file.lock().flush()?;
        self.metrics_file.lock().flush()?;

        let params = self.params.lock();
        if !params.is_empty() {
            let json = serde_json::to_string_pretty(&*params)?;
            fs::write(self.logging_directory.join(PARAMS_FILENAME), json)?;
        }
        drop(params);

        if let Some(run) = self.tracking.lock().as_mut() {
            run.end(status)?;
        }
        Ok(())
    }
}

impl Drop for Experiment {
    fn drop(&mut self) {
        if let Err(err) = self.close(RunStatus::Failed) {
            warn!(
                "failed to close experiment {}: {}",
                self.logging_directory.display(),
                err
            );
        }
    }
}

/// Remove every entry of a directory except the lock file.
fn clear_directory(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() == LOCK_FILENAME {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Borrowed logger writing through an open experiment
#[derive(Debug, Clone, Copy)]
pub struct ExperimentLogger<'a> {
    experiment: &'a Experiment,
}

impl FoldLogger for ExperimentLogger<'_> {
    fn log(&self, message: &str) {
        self.experiment.log(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldboost_frame::{read_npy, Column};
    use tempfile::tempdir;

    fn options(overwrite: bool) -> ExperimentOptions {
        ExperimentOptions {
            overwrite,
            metrics_filename: "scores.txt".into(),
            tracking: None,
        }
    }

    #[test]
    fn test_log_and_metrics_files() {
        let root = tempdir().unwrap();
        let dir = root.path().join("exp");
        let exp = Experiment::open(&dir, options(false)).unwrap();
        exp.log("hello");
        exp.logger().log("from fold");
        exp.log_metric("Fold 1", 0.5).unwrap();
        exp.finish().unwrap();

        assert_eq!(fs::read_to_string(dir.join("log.txt")).unwrap(), "hello\nfrom fold\n");
        assert_eq!(fs::read_to_string(dir.join("scores.txt")).unwrap(), "Fold 1,0.5\n");
        assert!(!dir.join(LOCK_FILENAME).exists());
    }

    #[test]
    fn test_existing_directory_requires_overwrite() {
        let root = tempdir().unwrap();
        let dir = root.path().join("exp");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stale.txt"), "x").unwrap();

        assert!(matches!(
            Experiment::open(&dir, options(false)),
            Err(ExperimentError::DirectoryExists(_))
        ));

        let exp = Experiment::open(&dir, options(true)).unwrap();
        assert!(!dir.join("stale.txt").exists());
        exp.finish().unwrap();
    }

    #[test]
    fn test_concurrent_open_is_locked() {
        let root = tempdir().unwrap();
        let dir = root.path().join("exp");
        let first = Experiment::open(&dir, options(false)).unwrap();
        assert!(matches!(
            Experiment::open(&dir, options(true)),
            Err(ExperimentError::DirectoryLocked(_))
        ));
        drop(first);
        assert!(Experiment::open(&dir, options(true)).is_ok());
    }

    #[test]
    fn test_artifacts_and_params() {
        let root = tempdir().unwrap();
        let dir = root.path().join("exp");
        let exp = Experiment::open(&dir, options(false)).unwrap();

        let npy = exp.log_numpy("oof", &[1.0, 2.0]).unwrap();
        assert_eq!(read_npy(&npy).unwrap(), vec![1.0, 2.0]);

        let df = DataFrame::new(vec![Column::float("v", vec![0.5])]).unwrap();
        let csv = exp.log_dataframe("out.csv", &df, DataFormat::Csv).unwrap();
        assert_eq!(fs::read_to_string(csv).unwrap(), "v\n0.5\n");

        exp.log_param("depth", 6).unwrap();
        exp.finish().unwrap();
        let params: Value =
            serde_json::from_str(&fs::read_to_string(dir.join(PARAMS_FILENAME)).unwrap()).unwrap();
        assert_eq!(params["depth"], 6);
    }

    #[test]
    fn test_drop_marks_tracking_run_failed() {
        let root = tempdir().unwrap();
        let dir = root.path().join("exp");
        let store = root.path().join("mlruns");
        let opts = ExperimentOptions {
            tracking: Some(TrackingOptions {
                tracking_uri: Some(store.display().to_string()),
                experiment_id: None,
                run_name: Some("failing".into()),
            }),
            ..options(false)
        };

        let exp = Experiment::open(&dir, opts).unwrap();
        let run_id = exp.run_id().unwrap();
        exp.log_metric("Overall", 0.1).unwrap();
        drop(exp);

        let meta = fs::read_to_string(store.join("0").join(&run_id).join("meta.json")).unwrap();
        assert!(meta.contains("\"FAILED\""));
        assert!(meta.contains("\"failing\""));
    }
}
