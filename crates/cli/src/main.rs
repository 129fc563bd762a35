//! foldboost command line interface
//!
//! Runs k-fold GBDT experiments described by a TOML file and inspects the
//! fold models they leave behind.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use foldboost_cli::{commands, ExperimentConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "foldboost")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "k-fold GBDT experiment runner", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an experiment from a TOML config
    Run {
        /// Experiment config path
        #[arg(short, long)]
        config: PathBuf,

        /// Replace an existing logging directory
        #[arg(long)]
        overwrite: bool,
    },
    /// Summarize a saved fold model
    ShowModel {
        /// Backend that wrote the model (lgbm or cat)
        #[arg(long, default_value = "lgbm")]
        backend: String,

        /// Model file, e.g. output/exp1/models/fold1
        path: PathBuf,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run { config, overwrite } => {
            let experiment = ExperimentConfig::load(&config)?;
            experiment
                .validate()
                .with_context(|| format!("Invalid config {}", config.display()))?;

            info!("foldboost v{}", env!("CARGO_PKG_VERSION"));
            let result = commands::run(&experiment, overwrite)?;

            let n_folds = result.models.len();
            for (i, score) in result.scores.iter().enumerate() {
                if i < n_folds {
                    println!("Fold {}: {}", i + 1, score);
                } else {
                    println!("Overall: {}", score);
                }
            }
            println!("Artifacts: {}", experiment.logging_directory.display());
        }
        Commands::ShowModel { backend, path } => {
            let summary = commands::show_model(&backend, &path)?;
            println!("Backend:        {}", summary.backend);
            println!("Objective:      {}", summary.objective);
            println!("Trees:          {}", summary.num_trees);
            if let Some(best) = summary.best_iteration {
                println!("Best iteration: {}", best);
            }
            println!("Features:       {}", summary.feature_names.join(", "));
            println!("BLAKE3:         {}", summary.digest);
        }
    }

    Ok(())
}
