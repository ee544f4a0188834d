use polars::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::errors::{PipelineError, Result};
use crate::io;
use crate::records::CounterRecord;

pub const COUNTER_NAME_COLUMN: &str = "counter_name";
pub const DATE_COLUMN: &str = "date";
pub const LATITUDE_COLUMN: &str = "latitude";
pub const LONGITUDE_COLUMN: &str = "longitude";
pub const TARGET_COLUMN: &str = "log_bike_count";

/// Read the training table (target required).
pub fn load_training_counters(path: &Path) -> Result<Vec<CounterRecord>> {
    load_counters(path, true)
}

/// Read the final test table (target ignored if present).
pub fn load_test_counters(path: &Path) -> Result<Vec<CounterRecord>> {
    load_counters(path, false)
}

fn load_counters(path: &Path, with_target: bool) -> Result<Vec<CounterRecord>> {
    let start = Instant::now();
    let df = io::read_parquet_to_polars_df(path)?;
    info!(
        "Loaded {:?}: shape {:?} in {:.2?}",
        path,
        df.shape(),
        start.elapsed()
    );
    let table = path.display().to_string();
    counters_from_frame(&df, with_target, &table)
}

/// Convert a counter table into typed records. Columns other than the
/// counter name, date, coordinates and (optionally) the target are ignored.
pub fn counters_from_frame(
    df: &DataFrame,
    with_target: bool,
    table: &str,
) -> Result<Vec<CounterRecord>> {
    let names = io::series_to_strings(io::required_column(df, COUNTER_NAME_COLUMN, table)?)?;
    let timestamps = io::series_to_timestamps(io::required_column(df, DATE_COLUMN, table)?)?;
    let latitudes = io::series_to_required_f64(io::required_column(df, LATITUDE_COLUMN, table)?)?;
    let longitudes = io::series_to_required_f64(io::required_column(df, LONGITUDE_COLUMN, table)?)?;
    let targets: Vec<Option<f64>> = if with_target {
        io::series_to_required_f64(io::required_column(df, TARGET_COLUMN, table)?)?
            .into_iter()
            .map(Some)
            .collect()
    } else {
        vec![None; df.height()]
    };

    let records = names
        .into_iter()
        .zip(timestamps)
        .zip(latitudes.into_iter().zip(longitudes))
        .zip(targets)
        .map(
            |(((counter_name, timestamp), (latitude, longitude)), log_bike_count)| CounterRecord {
                counter_name,
                timestamp,
                latitude,
                longitude,
                log_bike_count,
            },
        )
        .collect::<Vec<_>>();

    if records.is_empty() {
        return Err(PipelineError::EmptyDataset(format!(
            "no counter records in {}",
            table
        )));
    }
    Ok(records)
}

/// Read the raw weather table. Normalization happens in [`crate::weather`].
pub fn load_weather_frame(path: &Path) -> Result<DataFrame> {
    let start = Instant::now();
    let df = io::read_csv_to_polars_df(path)?;
    info!(
        "Loaded {:?}: shape {:?} in {:.2?}",
        path,
        df.shape(),
        start.elapsed()
    );
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_from_frame_with_target() {
        let df = df!(
            "counter_name" => ["A", "B"],
            "date" => ["2021-01-01 00:00:00", "2021-01-01 01:00:00"],
            "latitude" => [48.85, 48.86],
            "longitude" => [2.35, 2.36],
            "log_bike_count" => [1.5, 0.0],
            "site_id" => [1i32, 2],
        )
        .unwrap();

        let records = counters_from_frame(&df, true, "train").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].counter_name, "B");
        assert_eq!(records[1].timestamp.to_string(), "2021-01-01 01:00:00");
        assert_eq!(records[0].log_bike_count, Some(1.5));
    }

    #[test]
    fn test_counters_from_frame_without_target() {
        let df = df!(
            "counter_name" => ["A"],
            "date" => ["2021-01-01 00:00:00"],
            "latitude" => [48.85],
            "longitude" => [2.35],
        )
        .unwrap();

        let records = counters_from_frame(&df, false, "test").unwrap();
        assert_eq!(records[0].log_bike_count, None);
    }

    #[test]
    fn test_missing_target_column_is_fatal() {
        let df = df!(
            "counter_name" => ["A"],
            "date" => ["2021-01-01 00:00:00"],
            "latitude" => [48.85],
            "longitude" => [2.35],
        )
        .unwrap();

        let err = counters_from_frame(&df, true, "train").unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { ref column, .. } if column == "log_bike_count"));
    }

    #[test]
    fn test_null_coordinate_is_fatal() {
        let df = df!(
            "counter_name" => ["A", "B"],
            "date" => ["2021-01-01 00:00:00", "2021-01-01 00:00:00"],
            "latitude" => [Some(48.85), None],
            "longitude" => [2.35, 2.36],
        )
        .unwrap();

        let err = counters_from_frame(&df, false, "test").unwrap_err();
        assert!(matches!(err, PipelineError::NullValue { row: 1, .. }));
    }
}
