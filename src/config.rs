use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::features::WindThresholdPolicy;
use crate::grid_search::ParamGrid;
use crate::model::BoosterParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub weather_path: PathBuf,
    pub output_path: PathBuf,
    /// Weather columns with a lower non-null ratio are dropped.
    pub min_column_coverage: f64,
    pub test_fraction: f64,
    pub seed: u64,
    pub cv_folds: usize,
    pub wind_policy: WindThresholdPolicy,
    pub grid: ParamGrid,
    pub baseline: BoosterParams,
    /// 0 = all cores
    pub n_jobs: usize,
    pub show_progress: bool,
    pub checkpoint_dir: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            train_path: PathBuf::from("/kaggle/input/msdb-2024/train.parquet"),
            test_path: PathBuf::from("/kaggle/input/msdb-2024/final_test.parquet"),
            weather_path: PathBuf::from("/kaggle/input/msdb-2024/external_data.csv"),
            output_path: PathBuf::from("submission.csv"),
            min_column_coverage: 0.8,
            test_fraction: 0.2,
            seed: 42,
            cv_folds: 3,
            wind_policy: WindThresholdPolicy::default(),
            grid: ParamGrid::default(),
            baseline: BoosterParams::default(),
            n_jobs: 0,
            show_progress: true,
            checkpoint_dir: None,
            report_path: None,
        }
    }
}
