#[cfg(test)]
mod pipeline_tests {
    use crate::config::PipelineConfig;
    use crate::errors::PipelineError;
    use crate::features::WindThresholdPolicy;
    use crate::grid_search::ParamGrid;
    use crate::model::BoosterParams;
    use crate::pipeline::BikeCountPipeline;
    use crate::tests::test_helpers::{write_synthetic_inputs, SyntheticInputs};
    use std::path::Path;

    fn small_config(inputs: &SyntheticInputs, dir: &Path) -> PipelineConfig {
        PipelineConfig {
            train_path: inputs.train.clone(),
            test_path: inputs.test.clone(),
            weather_path: inputs.weather.clone(),
            output_path: dir.join("submission.csv"),
            grid: ParamGrid {
                n_estimators: vec![5],
                learning_rate: vec![0.1, 0.2],
                num_leaves: vec![4],
                max_depth: vec![-1],
                min_child_samples: vec![2],
            },
            baseline: BoosterParams {
                n_estimators: 5,
                min_child_samples: 2,
                ..BoosterParams::default()
            },
            n_jobs: 2,
            show_progress: false,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_end_to_end_writes_submission() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_synthetic_inputs(dir.path());
        let mut config = small_config(&inputs, dir.path());
        config.checkpoint_dir = Some(dir.path().join("checkpoints"));
        config.report_path = Some(dir.path().join("report.json"));

        let report = BikeCountPipeline::new(config.clone()).run().unwrap();

        assert_eq!(report.weather_hours, 73);
        assert_eq!(report.train_merge.merged_rows, 146);
        assert_eq!(report.test_merge.merged_rows, 50);
        assert_eq!(report.test_merge.dropped_rows, 10);
        assert_eq!(report.holdout_rows, 30);
        assert_eq!(report.fit_rows, 116);
        assert_eq!(report.candidates_evaluated, 2);
        assert_eq!(report.predictions_written, 50);
        assert!(report.baseline_rmse.is_finite());
        assert!(report.best_rmse.is_finite());

        let contents = std::fs::read_to_string(&config.output_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "Id,log_bike_count");
        assert_eq!(lines.len(), 51);
        for (i, line) in lines[1..].iter().enumerate() {
            let (id, value) = line.split_once(',').unwrap();
            assert_eq!(id.parse::<usize>().unwrap(), i);
            assert!(value.parse::<f64>().unwrap().is_finite());
        }

        let checkpoints = dir.path().join("checkpoints");
        assert!(checkpoints.join("train_features.parquet").exists());
        assert!(checkpoints.join("test_features.parquet").exists());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("report.json")).unwrap())
                .unwrap();
        assert_eq!(json["candidates_evaluated"], 2);
        assert_eq!(json["wind_policy"], "per-batch");
    }

    #[test]
    fn test_runs_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_synthetic_inputs(dir.path());
        let mut config = small_config(&inputs, dir.path());
        config.wind_policy = WindThresholdPolicy::FromTraining;

        let first = BikeCountPipeline::new(config.clone()).run().unwrap();
        let second = BikeCountPipeline::new(config).run().unwrap();
        assert_eq!(first.best_params, second.best_params);
        assert_eq!(first.best_cv_mse, second.best_cv_mse);
        assert_eq!(first.train_wind_threshold, first.test_wind_threshold);
    }

    #[test]
    fn test_missing_input_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_synthetic_inputs(dir.path());
        let mut config = small_config(&inputs, dir.path());
        config.weather_path = dir.path().join("missing.csv");

        let err = BikeCountPipeline::new(config.clone()).run().unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(!config.output_path.exists());
    }

    #[test]
    fn test_invalid_grid_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_synthetic_inputs(dir.path());
        let mut config = small_config(&inputs, dir.path());
        config.grid.learning_rate.clear();

        let err = BikeCountPipeline::new(config).run().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
