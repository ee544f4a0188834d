use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

use crate::errors::{PipelineError, Result};

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub fn read_parquet_to_polars_df(file_path: &Path) -> Result<DataFrame> {
    let file = File::open(file_path).map_err(|e| PipelineError::io(file_path, e))?;
    Ok(ParquetReader::new(file).finish()?)
}

pub fn read_csv_to_polars_df(file_path: &Path) -> Result<DataFrame> {
    if !file_path.exists() {
        return Err(PipelineError::io(
            file_path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        ));
    }
    // Full scan: sparse sensor columns can be empty for thousands of leading rows
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

pub fn write_polars_df_to_parquet(df: &mut DataFrame, output_path: &Path) -> Result<()> {
    let file = File::create(output_path).map_err(|e| PipelineError::io(output_path, e))?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}

pub fn write_polars_df_to_csv(df: &mut DataFrame, output_path: &Path) -> Result<()> {
    let mut file = File::create(output_path).map_err(|e| PipelineError::io(output_path, e))?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Look up a column, reporting which table it was expected in.
pub fn required_column<'a>(df: &'a DataFrame, name: &str, table: &str) -> Result<&'a Series> {
    df.column(name).map_err(|_| PipelineError::MissingColumn {
        column: name.to_string(),
        table: table.to_string(),
    })
}

/// Calculate the coverage (non-null ratio) of a series
pub fn coverage(series: &Series) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    (series.len() - series.null_count()) as f64 / series.len() as f64
}

pub fn series_to_vec_f64(series: &Series) -> Result<Vec<Option<f64>>> {
    let s_f64 = series.cast(&DataType::Float64)?;
    Ok(s_f64.f64()?.into_iter().collect())
}

/// Like [`series_to_vec_f64`] but every value must be present.
pub fn series_to_required_f64(series: &Series) -> Result<Vec<f64>> {
    series_to_vec_f64(series)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| PipelineError::NullValue {
                column: series.name().to_string(),
                row,
            })
        })
        .collect()
}

pub fn series_to_strings(series: &Series) -> Result<Vec<String>> {
    let s_str = series.cast(&DataType::String)?;
    s_str
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.map(str::to_owned).ok_or_else(|| PipelineError::NullValue {
                column: series.name().to_string(),
                row,
            })
        })
        .collect()
}

/// Convert a datetime or string column into naive timestamps.
///
/// Timezone-aware datetimes are read as UTC wall-clock time.
pub fn series_to_timestamps(series: &Series) -> Result<Vec<NaiveDateTime>> {
    let column = series.name().to_string();
    match series.dtype() {
        DataType::Datetime(_, tz) => {
            let micros = series
                .cast(&DataType::Datetime(TimeUnit::Microseconds, tz.clone()))?
                .cast(&DataType::Int64)?;
            micros
                .i64()?
                .into_iter()
                .enumerate()
                .map(|(row, value)| {
                    let value = value.ok_or_else(|| PipelineError::NullValue {
                        column: column.clone(),
                        row,
                    })?;
                    DateTime::from_timestamp_micros(value)
                        .map(|dt| dt.naive_utc())
                        .ok_or_else(|| PipelineError::TimestampParse {
                            column: column.clone(),
                            row,
                            value: value.to_string(),
                        })
                })
                .collect()
        }
        _ => {
            let s_str = series.cast(&DataType::String)?;
            s_str
                .str()?
                .into_iter()
                .enumerate()
                .map(|(row, value)| {
                    let value = value.ok_or_else(|| PipelineError::NullValue {
                        column: column.clone(),
                        row,
                    })?;
                    parse_timestamp(value).ok_or_else(|| PipelineError::TimestampParse {
                        column: column.clone(),
                        row,
                        value: value.to_string(),
                    })
                })
                .collect()
        }
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2021-01-01 13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2021-01-01T13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2021-01-01 13:00"), Some(expected));
        assert_eq!(parse_timestamp("2021-01-01T13:00:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_coverage() {
        let s = Series::new("t", &[Some(1.0), None, Some(3.0), None]);
        assert!((coverage(&s) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_string_timestamps_with_null_fail() {
        let s = Series::new("date", &[Some("2021-01-01 00:00:00"), None]);
        let err = series_to_timestamps(&s).unwrap_err();
        assert!(matches!(err, PipelineError::NullValue { row: 1, .. }));
    }

    #[test]
    fn test_datetime_series_to_timestamps() {
        let micros = Series::new("date", &[0i64, 3_600_000_000]);
        let dates = micros
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
            .unwrap();
        let parsed = series_to_timestamps(&dates).unwrap();
        assert_eq!(parsed[1].to_string(), "1970-01-01 01:00:00");
    }

    #[test]
    fn test_required_column_reports_table() {
        let df = df!("a" => [1i32]).unwrap();
        let err = required_column(&df, "b", "weather").unwrap_err();
        assert!(err.to_string().contains("weather"));
    }
}
