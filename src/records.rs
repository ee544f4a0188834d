use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One hourly reading of a bicycle counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub counter_name: String,
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    /// Present on training rows only.
    pub log_bike_count: Option<f64>,
}

/// Sensor values of one weather bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub t: f64,
    pub ff: f64,
    pub pres: f64,
    pub rafper: f64,
    pub u: f64,
    pub vv: f64,
    pub rr1: f64,
    pub rr3: f64,
    pub rr6: f64,
    pub rr12: f64,
}

impl WeatherObservation {
    pub fn from_values(values: [f64; 10]) -> Self {
        let [t, ff, pres, rafper, u, vv, rr1, rr3, rr6, rr12] = values;
        Self {
            t,
            ff,
            pres,
            rafper,
            u,
            vv,
            rr1,
            rr3,
            rr6,
            rr12,
        }
    }

    pub fn precipitation(&self) -> [f64; 4] {
        [self.rr1, self.rr3, self.rr6, self.rr12]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub timestamp: NaiveDateTime,
    pub observation: WeatherObservation,
}

/// Counter reading joined with the weather bucket of the same hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub counter: CounterRecord,
    pub weather: WeatherObservation,
}
