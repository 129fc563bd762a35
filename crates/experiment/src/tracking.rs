//! Local run tracking in a file-store layout
//!
//! ```text
//! <tracking_uri>/<experiment_id>/<run_id>/
//!     meta.json
//!     metrics/<name>      "<timestamp_ms> <value> <step>" per line
//!     params/<name>
//!     artifacts/
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::errors::Result;

/// Default store location, relative to the working directory
pub const DEFAULT_TRACKING_URI: &str = "mlruns";
pub const DEFAULT_EXPERIMENT_ID: &str = "0";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingOptions {
    pub tracking_uri: Option<String>,
    pub experiment_id: Option<String>,
    /// Defaults to the logging directory
    pub run_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub experiment_id: String,
    pub run_name: String,
    pub status: RunStatus,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub artifact_uri: String,
}

/// One active tracking run
#[derive(Debug)]
pub struct TrackingRun {
    run_dir: PathBuf,
    meta: RunMeta,
    steps: HashMap<String, u64>,
}

impl TrackingRun {
    pub fn start(options: &TrackingOptions, default_run_name: &str) -> Result<Self> {
        let uri = options
            .tracking_uri
            .clone()
            .unwrap_or_else(|| DEFAULT_TRACKING_URI.to_string());
        let experiment_id = options
            .experiment_id
            .clone()
            .unwrap_or_else(|| DEFAULT_EXPERIMENT_ID.to_string());
        let run_id = Uuid::new_v4().simple().to_string();
        let run_dir = Path::new(&uri).join(&experiment_id).join(&run_id);

        for sub in ["metrics", "params", "artifacts"] {
            fs::create_dir_all(run_dir.join(sub))?;
        }

        let meta = RunMeta {
            run_id,
            experiment_id,
            run_name: options
                .run_name
                .clone()
                .unwrap_or_else(|| default_run_name.to_string()),
            status: RunStatus::Running,
            start_time: Utc::now().timestamp_millis(),
            end_time: None,
            artifact_uri: run_dir.join("artifacts").display().to_string(),
        };

        let run = Self {
            run_dir,
            meta,
            steps: HashMap::new(),
        };
        run.write_meta()?;
        debug!("tracking run {} started in {}", run.meta.run_id, run.run_dir.display());
        Ok(run)
    }

    fn write_meta(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.meta)?;
        fs::write(self.run_dir.join("meta.json"), json)?;
        Ok(())
    }

    pub fn run_id(&self) -> &str {
        &self.meta.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn meta(&self) -> &RunMeta {
        &self.meta
    }

    pub fn log_metric(&mut self, name: &str, value: f64) -> Result<()> {
        let step = self.steps.entry(name.to_string()).or_insert(0);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.run_dir.join("metrics").join(name))?;
        writeln!(file, "{} {} {}", Utc::now().timestamp_millis(), value, step)?;
        *step += 1;
        Ok(())
    }

    pub fn log_param(&mut self, name: &str, value: &str) -> Result<()> {
        fs::write(self.run_dir.join("params").join(name), value)?;
        Ok(())
    }

    /// Copy a file into the run's artifact directory.
    pub fn log_artifact(&mut self, path: &Path) -> Result<()> {
        let file_name = path.file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", path.display()),
            )
        })?;
        fs::copy(path, self.run_dir.join("artifacts").join(file_name))?;
        Ok(())
    }

    pub fn end(&mut self, status: RunStatus) -> Result<()> {
        self.meta.status = status;
        self.meta.end_time = Some(Utc::now().timestamp_millis());
        self.write_meta()
    }
}
