use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::ops::RangeInclusive;

/// Read-only set of public holiday dates, passed to the feature builder.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    dates: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn from_dates<I: IntoIterator<Item = NaiveDate>>(dates: I) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    /// French national (metropolitan) holidays for every year in `years`.
    pub fn france(years: RangeInclusive<i32>) -> Self {
        let mut dates = HashSet::new();
        for year in years {
            let fixed = [
                (1, 1),   // Jour de l'an
                (5, 1),   // Fête du Travail
                (7, 14),  // Fête nationale
                (8, 15),  // Assomption
                (11, 1),  // Toussaint
                (11, 11), // Armistice 1918
                (12, 25), // Noël
            ];
            dates.extend(
                fixed
                    .iter()
                    .filter_map(|&(m, d)| NaiveDate::from_ymd_opt(year, m, d)),
            );
            if (1953..=1959).contains(&year) || year >= 1982 {
                dates.extend(NaiveDate::from_ymd_opt(year, 5, 8));
            }
            if let Some(easter) = easter_sunday(year) {
                dates.insert(easter + Duration::days(1));
                dates.insert(easter + Duration::days(39));
                if !(2005..=2007).contains(&year) {
                    dates.insert(easter + Duration::days(50));
                }
            }
        }
        Self { dates }
    }

    /// Calendar covering the years spanned by `timestamps`.
    pub fn france_for<'a, I>(timestamps: I) -> Self
    where
        I: IntoIterator<Item = &'a NaiveDateTime>,
    {
        let years: Vec<i32> = timestamps.into_iter().map(|ts| ts.year()).collect();
        match (years.iter().min(), years.iter().max()) {
            (Some(&first), Some(&last)) => Self::france(first..=last),
            _ => Self::default(),
        }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
