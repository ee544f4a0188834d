use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::records::{CounterRecord, MergedRecord, WeatherObservation, WeatherRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub input_rows: usize,
    pub merged_rows: usize,
    pub dropped_rows: usize,
}

/// Inner join on exact timestamp equality, keeping counter order.
pub fn merge_with_weather(
    counters: &[CounterRecord],
    weather: &[WeatherRecord],
    label: &str,
) -> (Vec<MergedRecord>, MergeStats) {
    let by_hour: HashMap<NaiveDateTime, WeatherObservation> = weather
        .iter()
        .map(|record| (record.timestamp, record.observation))
        .collect();

    let merged: Vec<MergedRecord> = counters
        .iter()
        .filter_map(|counter| {
            by_hour.get(&counter.timestamp).map(|weather| MergedRecord {
                counter: counter.clone(),
                weather: *weather,
            })
        })
        .collect();

    let stats = MergeStats {
        input_rows: counters.len(),
        merged_rows: merged.len(),
        dropped_rows: counters.len() - merged.len(),
    };
    if stats.dropped_rows > 0 {
        warn!(
            "{}: {} of {} counter rows have no weather bucket and were dropped",
            label, stats.dropped_rows, stats.input_rows
        );
    }
    info!("{}: merged {} rows with weather", label, stats.merged_rows);
    (merged, stats)
}
