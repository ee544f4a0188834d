use gbdt::config::Config as GbdtConfig;
use gbdt::decision_tree::{Data, DataVec, ValueType};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{PipelineError, Result};
use crate::features::FeaturizedRecord;
use crate::preprocessing::ColumnPreprocessor;

/// Boosted-tree hyperparameters, named after their LightGBM counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    /// `-1` means unbounded.
    pub max_depth: i32,
    pub min_child_samples: usize,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: -1,
            min_child_samples: 20,
        }
    }
}

impl fmt::Display for BoosterParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n_estimators={}, learning_rate={}, num_leaves={}, max_depth={}, min_child_samples={}",
            self.n_estimators,
            self.learning_rate,
            self.num_leaves,
            self.max_depth,
            self.min_child_samples
        )
    }
}

impl BoosterParams {
    /// Depth of a depth-wise tree holding at most `num_leaves` leaves,
    /// capped by a positive `max_depth`.
    pub fn tree_depth(&self) -> u32 {
        let leaf_depth = (self.num_leaves.max(2) as f64).log2().floor() as u32;
        if self.max_depth > 0 {
            leaf_depth.min(self.max_depth as u32)
        } else {
            leaf_depth
        }
    }

    fn gbdt_config(&self, feature_size: usize) -> GbdtConfig {
        let mut cfg = GbdtConfig::new();
        cfg.set_feature_size(feature_size);
        cfg.set_max_depth(self.tree_depth());
        cfg.set_iterations(self.n_estimators);
        cfg.set_shrinkage(self.learning_rate as ValueType);
        cfg.set_min_leaf_size(self.min_child_samples);
        cfg.set_loss("SquaredError");
        cfg.set_data_sample_ratio(1.0);
        cfg.set_feature_sample_ratio(1.0);
        cfg.set_training_optimization_level(2);
        cfg.set_debug(false);
        cfg
    }
}

/// Unfitted preprocessing + boosted-tree pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ModelPipeline {
    params: BoosterParams,
}

impl ModelPipeline {
    pub fn new(params: BoosterParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    /// Fit the preprocessor and the regressor on `records` / `targets`.
    pub fn fit(&self, records: &[FeaturizedRecord], targets: &[f64]) -> Result<FittedPipeline> {
        if records.is_empty() {
            return Err(PipelineError::EmptyDataset("no rows to fit the model on".into()));
        }
        let preprocessor = ColumnPreprocessor::fit(records)?;
        let x = preprocessor.transform(records)?;

        let mut train_data: DataVec = x
            .axis_iter(Axis(0))
            .zip(targets)
            .map(|(row, &y)| {
                Data::new_training_data(
                    row.iter().map(|&v| v as ValueType).collect(),
                    1.0,
                    y as ValueType,
                    None,
                )
            })
            .collect();

        let mut model = GBDT::new(&self.params.gbdt_config(preprocessor.n_output_features()));
        model.fit(&mut train_data);

        Ok(FittedPipeline {
            params: self.params,
            preprocessor,
            model,
        })
    }
}

/// Fitted pipeline; immutable once built.
pub struct FittedPipeline {
    params: BoosterParams,
    preprocessor: ColumnPreprocessor,
    model: GBDT,
}

impl fmt::Debug for FittedPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedPipeline")
            .field("params", &self.params)
            .field("n_features", &self.preprocessor.n_output_features())
            .finish()
    }
}

impl FittedPipeline {
    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    pub fn preprocessor(&self) -> &ColumnPreprocessor {
        &self.preprocessor
    }

    pub fn predict(&self, records: &[FeaturizedRecord]) -> Result<Vec<f64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let x = self.preprocessor.transform(records)?;
        Ok(self.predict_matrix(&x))
    }

    fn predict_matrix(&self, x: &Array2<f64>) -> Vec<f64> {
        let test_data: DataVec = x
            .axis_iter(Axis(0))
            .map(|row| Data::new_test_data(row.iter().map(|&v| v as ValueType).collect(), None))
            .collect();
        self.model
            .predict(&test_data)
            .into_iter()
            .map(f64::from)
            .collect()
    }
}

/// Targets of a training batch; every record must carry one.
pub fn training_targets(records: &[FeaturizedRecord]) -> Result<Vec<f64>> {
    records
        .iter()
        .enumerate()
        .map(|(row, r)| r.log_bike_count.ok_or(PipelineError::MissingTarget { row }))
        .collect()
}
