use chrono::{Duration, NaiveDateTime, Timelike};
use polars::prelude::*;
use tracing::{debug, info};

use crate::errors::{PipelineError, Result};
use crate::io;
use crate::records::{WeatherObservation, WeatherRecord};

pub const WEATHER_DATE_COLUMN: &str = "date";

/// Sensor columns kept after normalization, in [`WeatherObservation`] order.
pub const WEATHER_COLUMNS: [&str; 10] = [
    "t", "ff", "pres", "rafper", "u", "vv", "rr1", "rr3", "rr6", "rr12",
];

const RR1_INDEX: usize = 6;
const WEATHER_TABLE: &str = "weather table";

/// Turns the raw, irregular weather table into one gap-free record per hour.
pub struct WeatherNormalizer {
    min_column_coverage: f64,
}

impl Default for WeatherNormalizer {
    fn default() -> Self {
        Self::new(0.8)
    }
}

impl WeatherNormalizer {
    pub fn new(min_column_coverage: f64) -> Self {
        Self {
            min_column_coverage,
        }
    }

    pub fn normalize(&self, raw: &DataFrame) -> Result<Vec<WeatherRecord>> {
        if raw.height() == 0 {
            return Err(PipelineError::EmptyDataset("weather table has no rows".into()));
        }

        let dense = self.drop_sparse_columns(raw)?;
        let timestamps = io::series_to_timestamps(io::required_column(
            &dense,
            WEATHER_DATE_COLUMN,
            WEATHER_TABLE,
        )?)?;

        let mut columns = Vec::with_capacity(WEATHER_COLUMNS.len());
        for name in WEATHER_COLUMNS {
            let series = io::required_column(&dense, name, WEATHER_TABLE)?;
            columns.push(io::series_to_vec_f64(series)?);
        }
        clip_negative(&mut columns[RR1_INDEX]);

        let (hours, bucket_means) = resample_hourly_mean(&timestamps, &columns);
        info!(
            "Resampled {} weather rows into {} hourly buckets",
            timestamps.len(),
            hours.len()
        );

        let mut filled = Vec::with_capacity(bucket_means.len());
        for (name, values) in WEATHER_COLUMNS.iter().zip(&bucket_means) {
            let gaps = values.iter().filter(|v| v.is_none()).count();
            debug!("  {}: interpolating {} empty buckets", name, gaps);
            let column = interpolate_linear(values).ok_or_else(|| {
                PipelineError::EmptyDataset(format!("weather column '{}' has no values", name))
            })?;
            filled.push(column);
        }

        Ok(hours
            .into_iter()
            .enumerate()
            .map(|(i, timestamp)| {
                let mut values = [0.0; 10];
                for (slot, column) in values.iter_mut().zip(&filled) {
                    *slot = column[i];
                }
                WeatherRecord {
                    timestamp,
                    observation: WeatherObservation::from_values(values),
                }
            })
            .collect())
    }

    /// Drop every column with fewer than `min_column_coverage × rows` non-null values.
    pub fn drop_sparse_columns(&self, df: &DataFrame) -> Result<DataFrame> {
        let threshold = self.min_column_coverage * df.height() as f64;
        let mut kept = Vec::new();
        for series in df.get_columns() {
            let non_null = (series.len() - series.null_count()) as f64;
            if non_null >= threshold {
                kept.push(series.name().to_string());
            } else {
                debug!(
                    "Dropping sparse weather column '{}' (coverage {:.1}%)",
                    series.name(),
                    io::coverage(series) * 100.0
                );
            }
        }
        info!(
            "Kept {} of {} weather columns at coverage >= {:.0}%",
            kept.len(),
            df.width(),
            self.min_column_coverage * 100.0
        );
        Ok(df.select(kept)?)
    }
}

/// Truncate negative values to zero; nulls stay null.
pub fn clip_negative(values: &mut [Option<f64>]) {
    for value in values.iter_mut().flatten() {
        if *value < 0.0 {
            *value = 0.0;
        }
    }
}

pub fn floor_to_hour(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date().and_hms_opt(ts.hour(), 0, 0).unwrap_or(ts)
}

/// Average every column per hourly bucket over `[floor(min), floor(max)]`.
/// Buckets without a value come back as `None`.
pub fn resample_hourly_mean(
    timestamps: &[NaiveDateTime],
    columns: &[Vec<Option<f64>>],
) -> (Vec<NaiveDateTime>, Vec<Vec<Option<f64>>>) {
    let (Some(first), Some(last)) = (timestamps.iter().min(), timestamps.iter().max()) else {
        return (Vec::new(), vec![Vec::new(); columns.len()]);
    };
    let start = floor_to_hour(*first);
    let n_buckets = (floor_to_hour(*last) - start).num_hours() as usize + 1;

    let mut sums = vec![vec![0.0; n_buckets]; columns.len()];
    let mut counts = vec![vec![0usize; n_buckets]; columns.len()];
    for (row, ts) in timestamps.iter().enumerate() {
        let bucket = (floor_to_hour(*ts) - start).num_hours() as usize;
        for (c, column) in columns.iter().enumerate() {
            if let Some(value) = column[row] {
                sums[c][bucket] += value;
                counts[c][bucket] += 1;
            }
        }
    }

    let hours = (0..n_buckets)
        .map(|i| start + Duration::hours(i as i64))
        .collect();
    let means = sums
        .into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            sum.into_iter()
                .zip(count)
                .map(|(s, n)| if n > 0 { Some(s / n as f64) } else { None })
                .collect()
        })
        .collect();
    (hours, means)
}

/// Fill gaps by linear interpolation between the nearest known neighbours.
/// Leading gaps take the first known value, trailing gaps the last one.
/// Returns `None` when the column has no known value at all.
pub fn interpolate_linear(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    let &(first_idx, first_val) = known.first()?;
    let &(last_idx, last_val) = known.last()?;

    let mut filled = vec![0.0; values.len()];
    for slot in filled.iter_mut().take(first_idx) {
        *slot = first_val;
    }
    for pair in known.windows(2) {
        let (i0, v0) = pair[0];
        let (i1, v1) = pair[1];
        let span = (i1 - i0) as f64;
        for (offset, slot) in filled[i0..i1].iter_mut().enumerate() {
            *slot = v0 + (v1 - v0) * (offset as f64 / span);
        }
    }
    for slot in filled.iter_mut().skip(last_idx) {
        *slot = last_val;
    }
    Some(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn weather_frame(dates: &[&str], t: &[Option<f64>], rr1: &[Option<f64>]) -> DataFrame {
        let n = dates.len();
        let constant = |v: f64| vec![Some(v); n];
        df!(
            "numer_sta" => vec![7149i32; n],
            "date" => dates.to_vec(),
            "t" => t.to_vec(),
            "ff" => constant(3.0),
            "pres" => constant(101_000.0),
            "rafper" => constant(5.0),
            "u" => constant(80.0),
            "vv" => constant(20_000.0),
            "rr1" => rr1.to_vec(),
            "rr3" => constant(0.0),
            "rr6" => constant(0.0),
            "rr12" => constant(0.0),
            "sparse" => {
                let mut v: Vec<Option<f64>> = vec![None; n];
                v[0] = Some(1.0);
                v
            },
        )
        .unwrap()
    }

    #[test]
    fn test_drop_sparse_columns() {
        let df = weather_frame(
            &["2021-01-01 00:00:00", "2021-01-01 03:00:00", "2021-01-01 06:00:00"],
            &[Some(1.0), Some(2.0), Some(3.0)],
            &[Some(0.0), Some(0.0), Some(0.0)],
        );
        let dense = WeatherNormalizer::default().drop_sparse_columns(&df).unwrap();
        let names = dense.get_column_names();
        assert!(!names.contains(&"sparse"));
        assert!(names.contains(&"numer_sta"));
        assert!(names.contains(&"rr12"));
    }

    #[test]
    fn test_required_column_dropped_by_threshold_is_fatal() {
        let df = weather_frame(
            &["2021-01-01 00:00:00", "2021-01-01 03:00:00", "2021-01-01 06:00:00"],
            &[Some(1.0), Some(2.0), Some(3.0)],
            &[Some(0.0), None, None],
        );
        let err = WeatherNormalizer::default().normalize(&df).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { ref column, .. } if column == "rr1"));
    }

    #[test]
    fn test_negative_rain_is_clipped() {
        let df = weather_frame(
            &["2021-01-01 00:00:00", "2021-01-01 01:00:00"],
            &[Some(1.0), Some(2.0)],
            &[Some(-2.0), Some(0.4)],
        );
        let records = WeatherNormalizer::default().normalize(&df).unwrap();
        assert_eq!(records[0].timestamp.to_string(), "2021-01-01 00:00:00");
        assert_eq!(records[0].observation.rr1, 0.0);
        assert_relative_eq!(records[1].observation.rr1, 0.4);
        assert!(records.iter().all(|r| r.observation.rr1 >= 0.0));
    }

    #[test]
    fn test_resample_produces_one_row_per_hour() {
        let df = weather_frame(
            &["2021-01-01 00:00:00", "2021-01-01 03:00:00", "2021-01-01 06:00:00"],
            &[Some(0.0), Some(3.0), Some(9.0)],
            &[Some(0.0), Some(0.0), Some(0.0)],
        );
        let records = WeatherNormalizer::default().normalize(&df).unwrap();
        assert_eq!(records.len(), 7);
        for pair in records.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::hours(1));
        }
        let temps: Vec<f64> = records.iter().map(|r| r.observation.t).collect();
        let expected = [0.0, 1.0, 2.0, 3.0, 5.0, 7.0, 9.0];
        for (got, want) in temps.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-9);
        }
        assert!(records
            .iter()
            .all(|r| r.observation.precipitation().iter().all(|v| v.is_finite())));
    }

    #[test]
    fn test_resample_averages_within_bucket() {
        let ts: Vec<NaiveDateTime> = ["2021-01-01 00:10:00", "2021-01-01 00:50:00", "2021-01-01 01:00:00"]
            .iter()
            .map(|s| io::parse_timestamp(s).unwrap())
            .collect();
        let columns = vec![vec![Some(1.0), Some(3.0), None]];
        let (hours, means) = resample_hourly_mean(&ts, &columns);
        assert_eq!(hours.len(), 2);
        assert_eq!(means[0], vec![Some(2.0), None]);
    }

    #[test]
    fn test_interpolate_edges() {
        let filled = interpolate_linear(&[None, Some(2.0), None, Some(4.0), None]).unwrap();
        assert_eq!(filled, vec![2.0, 2.0, 3.0, 4.0, 4.0]);
        assert!(interpolate_linear(&[None, None]).is_none());
    }

    #[test]
    fn test_clip_keeps_nulls() {
        let mut values = vec![Some(-1.0), None, Some(2.0)];
        clip_negative(&mut values);
        assert_eq!(values, vec![Some(0.0), None, Some(2.0)]);
    }

    #[test]
    fn test_empty_weather_table() {
        let df = DataFrame::empty();
        assert!(matches!(
            WeatherNormalizer::default().normalize(&df),
            Err(PipelineError::EmptyDataset(_))
        ));
    }
}
