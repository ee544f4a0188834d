use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use bike_count_forecast::features::WindThresholdPolicy;
use bike_count_forecast::grid_search::ParamGrid;
use bike_count_forecast::{BikeCountPipeline, PipelineConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WindThreshold {
    /// Recompute on every batch
    PerBatch,
    /// Reuse the training threshold for the test batch
    FromTraining,
}

impl From<WindThreshold> for WindThresholdPolicy {
    fn from(value: WindThreshold) -> Self {
        match value {
            WindThreshold::PerBatch => WindThresholdPolicy::PerBatch,
            WindThreshold::FromTraining => WindThresholdPolicy::FromTraining,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "bike_count_forecast")]
#[command(about = "Hourly bike count regression with weather and calendar features", long_about = None)]
struct Args {
    /// Training counts (parquet)
    #[arg(long, env = "TRAIN_PATH", default_value = "/kaggle/input/msdb-2024/train.parquet")]
    train_path: PathBuf,

    /// Counts to predict (parquet)
    #[arg(long, env = "TEST_PATH", default_value = "/kaggle/input/msdb-2024/final_test.parquet")]
    test_path: PathBuf,

    /// Weather observations (CSV)
    #[arg(long, env = "WEATHER_PATH", default_value = "/kaggle/input/msdb-2024/external_data.csv")]
    weather_path: PathBuf,

    /// Submission CSV
    #[arg(long, env = "OUTPUT_PATH", default_value = "submission.csv")]
    output_path: PathBuf,

    /// JSON file overriding the hyperparameter grid
    #[arg(long, env = "GRID_CONFIG")]
    grid_config: Option<PathBuf>,

    /// Directory for featurized parquet checkpoints
    #[arg(long, env = "CHECKPOINT_DIR")]
    checkpoint_dir: Option<PathBuf>,

    /// Write a JSON run report here
    #[arg(long, env = "REPORT_PATH")]
    report_path: Option<PathBuf>,

    /// How the high-wind threshold is derived for the test batch
    #[arg(long, value_enum, default_value = "per-batch")]
    wind_threshold: WindThreshold,

    /// Grid search worker threads (0 = all cores)
    #[arg(long, env = "N_JOBS", default_value = "0")]
    n_jobs: usize,

    /// Seed for the train/holdout split
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Hide the grid search progress bar
    #[arg(long)]
    no_progress: bool,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bike_count_forecast=info".parse()?),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let args = Args::parse();

    let grid = match &args.grid_config {
        Some(path) => ParamGrid::from_json_file(path)
            .with_context(|| format!("Failed to load parameter grid from {:?}", path))?,
        None => ParamGrid::default(),
    };
    info!("Parameter grid holds {} candidates", grid.len());

    let config = PipelineConfig {
        train_path: args.train_path,
        test_path: args.test_path,
        weather_path: args.weather_path,
        output_path: args.output_path,
        wind_policy: args.wind_threshold.into(),
        grid,
        n_jobs: args.n_jobs,
        seed: args.seed,
        show_progress: !args.no_progress,
        checkpoint_dir: args.checkpoint_dir,
        report_path: args.report_path,
        ..PipelineConfig::default()
    };

    let report = BikeCountPipeline::new(config)
        .run()
        .context("Bike count pipeline failed")?;

    info!(
        "Done: baseline RMSE {:.6}, best RMSE {:.6} with {}",
        report.baseline_rmse, report.best_rmse, report.best_params
    );
    Ok(())
}
