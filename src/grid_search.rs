use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::errors::{ConfigError, PipelineError, Result};
use crate::features::FeaturizedRecord;
use crate::metrics::mean_squared_error;
use crate::model::{BoosterParams, FittedPipeline, ModelPipeline};
use crate::split::{kfold, take};

/// Candidate values per hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub num_leaves: Vec<usize>,
    pub max_depth: Vec<i32>,
    pub min_child_samples: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200, 300],
            learning_rate: vec![0.05, 0.1, 0.2],
            num_leaves: vec![31, 50, 70],
            max_depth: vec![-1, 10, 20],
            min_child_samples: vec![10, 20, 30],
        }
    }
}

impl ParamGrid {
    pub fn from_json_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let grid: ParamGrid =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| ConfigError::JsonParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let axes = [
            ("n_estimators", self.n_estimators.len()),
            ("learning_rate", self.learning_rate.len()),
            ("num_leaves", self.num_leaves.len()),
            ("max_depth", self.max_depth.len()),
            ("min_child_samples", self.min_child_samples.len()),
        ];
        if let Some((name, _)) = axes.iter().find(|(_, len)| *len == 0) {
            return Err(ConfigError::InvalidGrid(format!("'{}' has no candidates", name)));
        }
        if self.n_estimators.contains(&0) {
            return Err(ConfigError::InvalidGrid("n_estimators must be positive".into()));
        }
        if self.learning_rate.iter().any(|&lr| lr <= 0.0 || !lr.is_finite()) {
            return Err(ConfigError::InvalidGrid("learning_rate must be positive".into()));
        }
        if self.num_leaves.iter().any(|&n| n < 2) {
            return Err(ConfigError::InvalidGrid("num_leaves must be at least 2".into()));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.learning_rate.len()
            * self.num_leaves.len()
            * self.max_depth.len()
            * self.min_child_samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product with parameter names iterated alphabetically and the
    /// last one varying fastest.
    pub fn candidates(&self) -> Vec<BoosterParams> {
        let mut out = Vec::with_capacity(self.len());
        for &learning_rate in &self.learning_rate {
            for &max_depth in &self.max_depth {
                for &min_child_samples in &self.min_child_samples {
                    for &n_estimators in &self.n_estimators {
                        for &num_leaves in &self.num_leaves {
                            out.push(BoosterParams {
                                n_estimators,
                                learning_rate,
                                num_leaves,
                                max_depth,
                                min_child_samples,
                            });
                        }
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub params: BoosterParams,
    pub fold_mse: Vec<f64>,
    pub mean_mse: f64,
}

pub struct GridSearchOutcome {
    pub best_index: usize,
    pub best_params: BoosterParams,
    pub best_mean_mse: f64,
    pub candidates: Vec<CandidateScore>,
    /// Best candidate refit on all rows passed to the search.
    pub best_pipeline: FittedPipeline,
}

/// Exhaustive K-fold grid search; (candidate, fold) fits run on a rayon pool.
pub struct GridSearch {
    grid: ParamGrid,
    folds: usize,
    n_jobs: usize,
    show_progress: bool,
}

struct Fold {
    train_x: Vec<FeaturizedRecord>,
    train_y: Vec<f64>,
    test_x: Vec<FeaturizedRecord>,
    test_y: Vec<f64>,
}

impl GridSearch {
    pub fn new(grid: ParamGrid, folds: usize) -> Self {
        Self {
            grid,
            folds,
            n_jobs: 0,
            show_progress: true,
        }
    }

    /// Worker threads; 0 uses every available core.
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn fit(&self, records: &[FeaturizedRecord], targets: &[f64]) -> Result<GridSearchOutcome> {
        self.grid.validate()?;
        if records.len() < self.folds {
            return Err(PipelineError::EmptyDataset(format!(
                "{} rows cannot be split into {} folds",
                records.len(),
                self.folds
            )));
        }

        let candidates = self.grid.candidates();
        let folds: Vec<Fold> = kfold(records.len(), self.folds)
            .into_iter()
            .map(|split| Fold {
                train_x: take(records, &split.train),
                train_y: take(targets, &split.train),
                test_x: take(records, &split.test),
                test_y: take(targets, &split.test),
            })
            .collect();
        let tasks: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            folds.len(),
            candidates.len(),
            tasks.len()
        );
        let progress = self.progress_bar(tasks.len() as u64);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_jobs)
            .build()?;

        let start = Instant::now();
        let scores: Vec<f64> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(c, f)| {
                    let fold = &folds[f];
                    let fitted = ModelPipeline::new(candidates[c]).fit(&fold.train_x, &fold.train_y)?;
                    let predictions = fitted.predict(&fold.test_x)?;
                    progress.inc(1);
                    Ok(mean_squared_error(&fold.test_y, &predictions))
                })
                .collect::<Result<Vec<f64>>>()
        })?;
        progress.finish_with_message("Grid search completed");
        info!("Grid search fits completed in {:.2?}", start.elapsed());

        let candidate_scores: Vec<CandidateScore> = candidates
            .iter()
            .zip(scores.chunks(folds.len()))
            .map(|(params, fold_mse)| {
                let mean_mse = fold_mse.iter().sum::<f64>() / fold_mse.len() as f64;
                debug!("  {} -> mean MSE {:.6}", params, mean_mse);
                CandidateScore {
                    params: *params,
                    fold_mse: fold_mse.to_vec(),
                    mean_mse,
                }
            })
            .collect();

        let best_index = select_best(&candidate_scores).ok_or_else(|| {
            PipelineError::EmptyDataset("parameter grid produced no candidates".into())
        })?;
        let best = &candidate_scores[best_index];
        info!("Best parameters: {} (mean CV MSE {:.6})", best.params, best.mean_mse);

        let best_pipeline = ModelPipeline::new(best.params).fit(records, targets)?;
        Ok(GridSearchOutcome {
            best_index,
            best_params: best.params,
            best_mean_mse: best.mean_mse,
            candidates: candidate_scores,
            best_pipeline,
        })
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            progress.set_style(style.progress_chars("#>-"));
        }
        progress
    }
}

/// Lowest mean MSE; ties keep the earliest candidate. NaN scores never win.
pub fn select_best(scores: &[CandidateScore]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.mean_mse.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, s)| match best {
            Some((_, score)) if score <= s.mean_mse => best,
            _ => Some((i, s.mean_mse)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::training_targets;
    use crate::tests::test_helpers::synthetic_featurized;
    use std::io::Write;

    fn score(mean_mse: f64) -> CandidateScore {
        CandidateScore {
            params: BoosterParams::default(),
            fold_mse: vec![mean_mse],
            mean_mse,
        }
    }

    #[test]
    fn test_default_grid_has_243_candidates() {
        let grid = ParamGrid::default();
        let candidates = grid.candidates();
        assert_eq!(candidates.len(), 243);
        assert_eq!(grid.len(), 243);
        assert_eq!(
            candidates[0],
            BoosterParams {
                n_estimators: 100,
                learning_rate: 0.05,
                num_leaves: 31,
                max_depth: -1,
                min_child_samples: 10,
            }
        );
        assert_eq!(candidates[1].num_leaves, 50);
        assert_eq!(candidates[3].n_estimators, 200);
        assert_eq!(candidates[242].learning_rate, 0.2);
    }

    #[test]
    fn test_select_best_prefers_first_on_ties() {
        let scores = vec![score(0.5), score(0.2), score(f64::NAN), score(0.2)];
        assert_eq!(select_best(&scores), Some(1));
        assert_eq!(select_best(&[]), None);
    }

    #[test]
    fn test_validate_rejects_bad_grids() {
        let mut grid = ParamGrid::default();
        grid.max_depth.clear();
        assert!(matches!(grid.validate(), Err(ConfigError::InvalidGrid(_))));

        let mut grid = ParamGrid::default();
        grid.num_leaves = vec![1];
        assert!(grid.validate().is_err());

        let mut grid = ParamGrid::default();
        grid.learning_rate = vec![0.0];
        assert!(grid.validate().is_err());
    }

    #[test]
    fn test_grid_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"n_estimators": [5], "learning_rate": [0.1, 0.3], "num_leaves": [4],
                "max_depth": [-1], "min_child_samples": [2]}}"#
        )
        .unwrap();
        let grid = ParamGrid::from_json_file(file.path()).unwrap();
        assert_eq!(grid.len(), 2);

        let missing = ParamGrid::from_json_file(Path::new("/nonexistent/grid.json"));
        assert!(matches!(missing, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_small_search_is_deterministic() {
        let records = synthetic_featurized(45, 11);
        let targets = training_targets(&records).unwrap();
        let grid = ParamGrid {
            n_estimators: vec![3, 10],
            learning_rate: vec![0.1],
            num_leaves: vec![4],
            max_depth: vec![-1],
            min_child_samples: vec![2],
        };
        let search = GridSearch::new(grid, 3).with_n_jobs(2).with_progress(false);

        let first = search.fit(&records, &targets).unwrap();
        let second = search.fit(&records, &targets).unwrap();
        assert_eq!(first.candidates.len(), 2);
        assert!(first.candidates.iter().all(|c| c.fold_mse.len() == 3));
        assert_eq!(first.best_params, second.best_params);
        assert_eq!(first.best_mean_mse, second.best_mean_mse);
        assert_eq!(
            first.best_pipeline.predict(&records).unwrap().len(),
            records.len()
        );
    }

    #[test]
    fn test_too_few_rows_for_folds() {
        let records = synthetic_featurized(2, 1);
        let targets = training_targets(&records).unwrap();
        let search = GridSearch::new(ParamGrid::default(), 3).with_progress(false);
        assert!(matches!(
            search.fit(&records, &targets),
            Err(PipelineError::EmptyDataset(_))
        ));
    }
}
