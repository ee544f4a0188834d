use polars::prelude::*;
use std::path::Path;
use tracing::info;

use crate::errors::Result;
use crate::io::write_polars_df_to_csv;
use crate::loader::TARGET_COLUMN;

pub const ID_COLUMN: &str = "Id";

/// Submission frame: `Id` is the 0-based position of each prediction.
pub fn submission_frame(predictions: &[f64]) -> PolarsResult<DataFrame> {
    let ids: Vec<i64> = (0..predictions.len() as i64).collect();
    df!(
        ID_COLUMN => ids,
        TARGET_COLUMN => predictions.to_vec()
    )
}

pub fn write_submission(path: &Path, predictions: &[f64]) -> Result<()> {
    let mut df = submission_frame(predictions)?;
    write_polars_df_to_csv(&mut df, path)?;
    info!("Wrote {} predictions to {:?}", predictions.len(), path);
    Ok(())
}
