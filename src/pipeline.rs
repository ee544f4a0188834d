use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, Result};
use crate::features::{features_to_dataframe, FeatureBuilder, FeaturizedRecord, WindThresholdPolicy};
use crate::grid_search::{CandidateScore, GridSearch};
use crate::holidays::HolidayCalendar;
use crate::io::write_polars_df_to_parquet;
use crate::loader;
use crate::merge::{merge_with_weather, MergeStats};
use crate::metrics::root_mean_squared_error;
use crate::model::{training_targets, BoosterParams, ModelPipeline};
use crate::split::{take, train_test_split};
use crate::submission::write_submission;
use crate::weather::WeatherNormalizer;

/// Summary of one end-to-end run, optionally written as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub weather_hours: usize,
    pub holidays: usize,
    pub train_merge: MergeStats,
    pub test_merge: MergeStats,
    pub wind_policy: WindThresholdPolicy,
    pub train_wind_threshold: Option<f64>,
    pub test_wind_threshold: Option<f64>,
    pub fit_rows: usize,
    pub holdout_rows: usize,
    pub baseline_params: BoosterParams,
    pub baseline_rmse: f64,
    pub best_params: BoosterParams,
    pub best_cv_mse: f64,
    pub best_rmse: f64,
    pub candidates_evaluated: usize,
    pub cv_results: Vec<CandidateScore>,
    pub predictions_written: usize,
}

pub struct BikeCountPipeline {
    config: PipelineConfig,
}

impl BikeCountPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunReport> {
        let cfg = &self.config;
        let run_start = Instant::now();
        info!("Starting bike count pipeline");
        cfg.grid.validate()?;

        // Load
        let train_counters = loader::load_training_counters(&cfg.train_path)?;
        let test_counters = loader::load_test_counters(&cfg.test_path)?;
        let raw_weather = loader::load_weather_frame(&cfg.weather_path)?;

        // Weather
        let weather = WeatherNormalizer::new(cfg.min_column_coverage).normalize(&raw_weather)?;

        // Merge
        let (train_merged, train_merge) = merge_with_weather(&train_counters, &weather, "train");
        let (test_merged, test_merge) = merge_with_weather(&test_counters, &weather, "test");
        if train_merged.is_empty() {
            return Err(PipelineError::EmptyDataset(
                "no training rows matched a weather hour".into(),
            ));
        }

        // Features
        let holidays = HolidayCalendar::france_for(
            train_counters
                .iter()
                .chain(&test_counters)
                .map(|c| &c.timestamp),
        );
        let holiday_count = holidays.len();
        info!("Holiday calendar holds {} dates", holiday_count);
        let builder = FeatureBuilder::new(holidays);
        let (train_batch, test_batch) = builder.build_pair(&train_merged, &test_merged, cfg.wind_policy);
        if let Some(dir) = &cfg.checkpoint_dir {
            write_checkpoints(dir, &train_batch.records, &test_batch.records)?;
        }

        // Split
        let targets = training_targets(&train_batch.records)?;
        let split = train_test_split(train_batch.records.len(), cfg.test_fraction, cfg.seed);
        let x_fit = take(&train_batch.records, &split.train);
        let y_fit = take(&targets, &split.train);
        let x_holdout = take(&train_batch.records, &split.test);
        let y_holdout = take(&targets, &split.test);
        info!(
            "Split {} training rows into {} fit / {} holdout (seed {})",
            targets.len(),
            x_fit.len(),
            x_holdout.len(),
            cfg.seed
        );

        // Baseline
        let stage = Instant::now();
        let baseline = ModelPipeline::new(cfg.baseline).fit(&x_fit, &y_fit)?;
        let baseline_rmse = root_mean_squared_error(&y_holdout, &baseline.predict(&x_holdout)?);
        info!(
            "Baseline RMSE: {:.6} ({}) in {:.2?}",
            baseline_rmse,
            cfg.baseline,
            stage.elapsed()
        );

        // Grid search
        let search = GridSearch::new(cfg.grid.clone(), cfg.cv_folds)
            .with_n_jobs(cfg.n_jobs)
            .with_progress(cfg.show_progress);
        let outcome = search.fit(&x_fit, &y_fit)?;
        let best_rmse =
            root_mean_squared_error(&y_holdout, &outcome.best_pipeline.predict(&x_holdout)?);
        info!("Best model RMSE: {:.6}", best_rmse);
        if best_rmse > baseline_rmse {
            warn!(
                "Tuned model RMSE {:.6} is worse than baseline {:.6}",
                best_rmse, baseline_rmse
            );
        }

        // Predict
        let predictions = outcome.best_pipeline.predict(&test_batch.records)?;
        write_submission(&cfg.output_path, &predictions)?;

        let report = RunReport {
            weather_hours: weather.len(),
            holidays: holiday_count,
            train_merge,
            test_merge,
            wind_policy: cfg.wind_policy,
            train_wind_threshold: train_batch.wind_threshold,
            test_wind_threshold: test_batch.wind_threshold,
            fit_rows: x_fit.len(),
            holdout_rows: x_holdout.len(),
            baseline_params: cfg.baseline,
            baseline_rmse,
            best_params: outcome.best_params,
            best_cv_mse: outcome.best_mean_mse,
            best_rmse,
            candidates_evaluated: outcome.candidates.len(),
            cv_results: outcome.candidates,
            predictions_written: predictions.len(),
        };
        if let Some(path) = &cfg.report_path {
            write_report(path, &report)?;
        }

        info!("Pipeline completed in {:.2?}", run_start.elapsed());
        Ok(report)
    }
}

fn write_checkpoints(dir: &Path, train: &[FeaturizedRecord], test: &[FeaturizedRecord]) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
    for (name, records) in [("train_features.parquet", train), ("test_features.parquet", test)] {
        let path = dir.join(name);
        let mut df = features_to_dataframe(records)?;
        write_polars_df_to_parquet(&mut df, &path)?;
        info!("Checkpoint {:?}: shape {:?}", path, df.shape());
    }
    Ok(())
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;
    info!("Run report written to {:?}", path);
    Ok(())
}
