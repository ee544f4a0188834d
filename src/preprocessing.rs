use ndarray::{Array1, Array2, ArrayView2, Axis};
use std::collections::{BTreeSet, HashMap};

use crate::errors::{PipelineError, Result};
use crate::features::{FeaturizedRecord, CATEGORICAL_COLUMNS, NUMERICAL_COLUMNS};

/// Zero mean / unit variance per column, population std.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<f64>) -> Result<Self> {
        let means = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::EmptyDataset("cannot fit scaler on zero rows".into()))?;
        // Constant columns keep their centred value
        let scales = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 { s } else { 1.0 });
        Ok(Self { means, scales })
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Array2<f64> {
        (&x - &self.means) / &self.scales
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }
}

/// One-hot encoding with sorted categories; unknown values encode to zeros.
#[derive(Debug, Clone)]
pub struct OneHotEncoder {
    categories: Vec<Vec<String>>,
    lookup: Vec<HashMap<String, usize>>,
    offsets: Vec<usize>,
    width: usize,
}

impl OneHotEncoder {
    pub fn fit<R: AsRef<[String]>>(rows: &[R]) -> Self {
        let n_columns = rows.first().map_or(0, |r| r.as_ref().len());
        let mut seen: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); n_columns];
        for row in rows {
            for (column, value) in seen.iter_mut().zip(row.as_ref()) {
                column.insert(value.as_str());
            }
        }

        let categories: Vec<Vec<String>> = seen
            .into_iter()
            .map(|set| set.into_iter().map(str::to_owned).collect())
            .collect();
        let lookup = categories
            .iter()
            .map(|cats| {
                cats.iter()
                    .enumerate()
                    .map(|(i, c)| (c.clone(), i))
                    .collect()
            })
            .collect();
        let mut offsets = Vec::with_capacity(categories.len());
        let mut width = 0;
        for cats in &categories {
            offsets.push(width);
            width += cats.len();
        }

        Self {
            categories,
            lookup,
            offsets,
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }

    /// Write the encoding of `row` into `out` (length [`Self::width`]).
    pub fn encode_into(&self, row: &[String], out: &mut [f64]) {
        out.iter_mut().for_each(|v| *v = 0.0);
        for ((value, lookup), offset) in row.iter().zip(&self.lookup).zip(&self.offsets) {
            if let Some(&idx) = lookup.get(value) {
                out[offset + idx] = 1.0;
            }
        }
    }
}

/// Scales [`NUMERICAL_COLUMNS`] and one-hot encodes [`CATEGORICAL_COLUMNS`];
/// output columns are the numeric block followed by the one-hot block.
#[derive(Debug, Clone)]
pub struct ColumnPreprocessor {
    scaler: StandardScaler,
    encoder: OneHotEncoder,
}

impl ColumnPreprocessor {
    pub fn fit(records: &[FeaturizedRecord]) -> Result<Self> {
        let numeric = numeric_matrix(records)?;
        let scaler = StandardScaler::fit(numeric.view())?;
        let categorical: Vec<[String; CATEGORICAL_COLUMNS.len()]> =
            records.iter().map(FeaturizedRecord::categorical_values).collect();
        let encoder = OneHotEncoder::fit(&categorical);
        Ok(Self { scaler, encoder })
    }

    pub fn n_output_features(&self) -> usize {
        NUMERICAL_COLUMNS.len() + self.encoder.width()
    }

    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    pub fn transform(&self, records: &[FeaturizedRecord]) -> Result<Array2<f64>> {
        let scaled = self.scaler.transform(numeric_matrix(records)?.view());
        let n_numeric = NUMERICAL_COLUMNS.len();
        let mut out = Array2::zeros((records.len(), self.n_output_features()));
        out.slice_mut(ndarray::s![.., ..n_numeric]).assign(&scaled);

        let mut one_hot = vec![0.0; self.encoder.width()];
        for (mut row, record) in out.axis_iter_mut(Axis(0)).zip(records) {
            self.encoder
                .encode_into(&record.categorical_values(), &mut one_hot);
            for (slot, value) in row.iter_mut().skip(n_numeric).zip(&one_hot) {
                *slot = *value;
            }
        }
        Ok(out)
    }
}

fn numeric_matrix(records: &[FeaturizedRecord]) -> Result<Array2<f64>> {
    let flat: Vec<f64> = records
        .iter()
        .flat_map(|r| r.numerical_values())
        .collect();
    Ok(Array2::from_shape_vec(
        (records.len(), NUMERICAL_COLUMNS.len()),
        flat,
    )?)
}
