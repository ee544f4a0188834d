use chrono::{Datelike, Timelike};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::holidays::HolidayCalendar;
use crate::loader::TARGET_COLUMN;
use crate::records::{MergedRecord, WeatherObservation};

pub const CATEGORICAL_COLUMNS: [&str; 3] = ["counter_name", "is_weekend", "is_holiday"];

pub const NUMERICAL_COLUMNS: [&str; 20] = [
    "latitude",
    "longitude",
    "t",
    "ff",
    "pres",
    "rafper",
    "u",
    "vv",
    "rr1",
    "year",
    "month",
    "day",
    "weekday",
    "hour",
    "day_of_week",
    "temp_hour",
    "weekend_temp",
    "comfort_index",
    "rain_intensity",
    "high_wind",
];

/// How the `high_wind` threshold is obtained for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindThresholdPolicy {
    /// Recompute mean + std on every batch (train and test differ).
    #[default]
    PerBatch,
    /// Compute on the training batch and reuse it for the test batch.
    FromTraining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// Monday = 0.
    pub weekday: u32,
    pub hour: u32,
    pub day_of_week: u32,
    pub is_weekend: u8,
    pub is_holiday: u8,
}

/// Merged record after the date-encoding step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedRecord {
    pub merged: MergedRecord,
    pub calendar: CalendarFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturizedRecord {
    pub counter_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub log_bike_count: Option<f64>,
    pub t: f64,
    pub ff: f64,
    pub pres: f64,
    pub rafper: f64,
    pub u: f64,
    pub vv: f64,
    pub rr1: f64,
    pub calendar: CalendarFeatures,
    pub temp_hour: f64,
    pub weekend_temp: f64,
    pub comfort_index: f64,
    pub rain_intensity: u8,
    pub high_wind: u8,
}

impl FeaturizedRecord {
    /// Values in [`NUMERICAL_COLUMNS`] order.
    pub fn numerical_values(&self) -> [f64; NUMERICAL_COLUMNS.len()] {
        let c = &self.calendar;
        [
            self.latitude,
            self.longitude,
            self.t,
            self.ff,
            self.pres,
            self.rafper,
            self.u,
            self.vv,
            self.rr1,
            c.year as f64,
            c.month as f64,
            c.day as f64,
            c.weekday as f64,
            c.hour as f64,
            c.day_of_week as f64,
            self.temp_hour,
            self.weekend_temp,
            self.comfort_index,
            self.rain_intensity as f64,
            self.high_wind as f64,
        ]
    }

    /// Values in [`CATEGORICAL_COLUMNS`] order.
    pub fn categorical_values(&self) -> [String; CATEGORICAL_COLUMNS.len()] {
        [
            self.counter_name.clone(),
            self.calendar.is_weekend.to_string(),
            self.calendar.is_holiday.to_string(),
        ]
    }
}

/// Featurized records plus the wind threshold that produced their `high_wind` flags.
#[derive(Debug, Clone)]
pub struct FeatureBatch {
    pub records: Vec<FeaturizedRecord>,
    pub wind_threshold: Option<f64>,
}

pub fn comfort_index(t: f64, u: f64) -> f64 {
    t - 0.55 * (1.0 - u / 100.0) * (t - 14.0)
}

/// Number of precipitation windows (1h, 3h, 6h, 12h) reporting rain.
pub fn rain_intensity(weather: &WeatherObservation) -> u8 {
    weather.precipitation().iter().filter(|&&v| v > 0.0).count() as u8
}

/// `mean + std` (sample std) of the wind speeds; `None` below two values.
pub fn wind_threshold(speeds: &[f64]) -> Option<f64> {
    if speeds.len() < 2 {
        return None;
    }
    let n = speeds.len() as f64;
    let mean = speeds.iter().sum::<f64>() / n;
    let variance = speeds.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(mean + variance.sqrt())
}

pub fn encode_dates(records: &[MergedRecord], holidays: &HolidayCalendar) -> Vec<DatedRecord> {
    records
        .iter()
        .map(|merged| {
            let ts = merged.counter.timestamp;
            let weekday = ts.weekday().num_days_from_monday();
            DatedRecord {
                merged: merged.clone(),
                calendar: CalendarFeatures {
                    year: ts.year(),
                    month: ts.month(),
                    day: ts.day(),
                    weekday,
                    hour: ts.hour(),
                    day_of_week: weekday,
                    is_weekend: u8::from(weekday >= 5),
                    is_holiday: u8::from(holidays.is_holiday(ts.date())),
                },
            }
        })
        .collect()
}

/// Interaction and weather-derived features. `threshold` overrides the
/// batch-computed wind threshold when given.
pub fn encode_weather_features(records: &[DatedRecord], threshold: Option<f64>) -> FeatureBatch {
    let wind_threshold = threshold.or_else(|| {
        let speeds: Vec<f64> = records.iter().map(|r| r.merged.weather.ff).collect();
        wind_threshold(&speeds)
    });

    let records = records
        .iter()
        .map(|dated| {
            let counter = &dated.merged.counter;
            let w = &dated.merged.weather;
            let calendar = dated.calendar;
            FeaturizedRecord {
                counter_name: counter.counter_name.clone(),
                latitude: counter.latitude,
                longitude: counter.longitude,
                log_bike_count: counter.log_bike_count,
                t: w.t,
                ff: w.ff,
                pres: w.pres,
                rafper: w.rafper,
                u: w.u,
                vv: w.vv,
                rr1: w.rr1,
                calendar,
                temp_hour: w.t * calendar.hour as f64,
                weekend_temp: w.t * calendar.is_weekend as f64,
                comfort_index: comfort_index(w.t, w.u),
                rain_intensity: rain_intensity(w),
                high_wind: u8::from(wind_threshold.is_some_and(|limit| w.ff > limit)),
            }
        })
        .collect();

    FeatureBatch {
        records,
        wind_threshold,
    }
}

/// Applies both feature steps in order with an injected holiday calendar.
pub struct FeatureBuilder {
    holidays: HolidayCalendar,
}

impl FeatureBuilder {
    pub fn new(holidays: HolidayCalendar) -> Self {
        Self { holidays }
    }

    pub fn build(&self, merged: &[MergedRecord], wind_threshold: Option<f64>) -> FeatureBatch {
        let dated = encode_dates(merged, &self.holidays);
        let batch = encode_weather_features(&dated, wind_threshold);
        let holidays = batch
            .records
            .iter()
            .filter(|r| r.calendar.is_holiday == 1)
            .count();
        info!(
            "Built features for {} records ({} on holidays, wind threshold {:?})",
            batch.records.len(),
            holidays,
            batch.wind_threshold
        );
        batch
    }

    /// Build the training batch, then the test batch under `policy`.
    pub fn build_pair(
        &self,
        train: &[MergedRecord],
        test: &[MergedRecord],
        policy: WindThresholdPolicy,
    ) -> (FeatureBatch, FeatureBatch) {
        let train_batch = self.build(train, None);
        let test_threshold = match policy {
            WindThresholdPolicy::PerBatch => None,
            WindThresholdPolicy::FromTraining => train_batch.wind_threshold,
        };
        let test_batch = self.build(test, test_threshold);
        (train_batch, test_batch)
    }
}

/// Tabular view of a batch, for parquet checkpoints. The target column is
/// included only when every record carries one.
pub fn features_to_dataframe(records: &[FeaturizedRecord]) -> PolarsResult<DataFrame> {
    let mut columns = vec![Series::new(
        CATEGORICAL_COLUMNS[0],
        records.iter().map(|r| r.counter_name.as_str()).collect::<Vec<_>>(),
    )];
    for (idx, name) in NUMERICAL_COLUMNS.iter().enumerate() {
        let values: Vec<f64> = records.iter().map(|r| r.numerical_values()[idx]).collect();
        columns.push(Series::new(name, values));
    }
    columns.push(Series::new(
        CATEGORICAL_COLUMNS[1],
        records.iter().map(|r| r.calendar.is_weekend as i32).collect::<Vec<_>>(),
    ));
    columns.push(Series::new(
        CATEGORICAL_COLUMNS[2],
        records.iter().map(|r| r.calendar.is_holiday as i32).collect::<Vec<_>>(),
    ));
    let targets: Option<Vec<f64>> = records.iter().map(|r| r.log_bike_count).collect();
    if let Some(targets) = targets.filter(|t| !t.is_empty()) {
        columns.push(Series::new(TARGET_COLUMN, targets));
    }
    DataFrame::new(columns)
}
