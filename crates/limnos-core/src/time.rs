//! Time primitives for the simulation engine
//!
//! Every sample and event is stamped with wall-clock UTC time. The variation
//! model only needs two projections of it: fractional hour-of-day for the
//! daily cycle and day-of-year for the seasonal cycle.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Wall-clock timestamp used throughout the engine
pub type Timestamp = DateTime<Utc>;

/// Hours in a day, as used by the daily cycle
pub const HOURS_PER_DAY: f64 = 24.0;

/// Days in the seasonal cycle
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Fractional hour of day in [0, 24)
#[inline]
pub fn hour_of_day(t: Timestamp) -> f64 {
    t.hour() as f64 + t.minute() as f64 / 60.0 + t.second() as f64 / 3600.0
}

/// Day of year, 1-based (1..=366)
#[inline]
pub fn day_of_year(t: Timestamp) -> f64 {
    t.ordinal() as f64
}

/// Phase of the daily cycle in radians, zero at the given peak hour minus six hours,
/// so that `sin(daily_phase(t, peak))` is 1.0 at `peak`.
#[inline]
pub fn daily_phase(t: Timestamp, peak_hour: f64) -> f64 {
    2.0 * std::f64::consts::PI * (hour_of_day(t) - peak_hour + 6.0) / HOURS_PER_DAY
}

/// Phase of the seasonal cycle in radians; `sin(seasonal_phase(t, peak))` is 1.0 on `peak_day`.
#[inline]
pub fn seasonal_phase(t: Timestamp, peak_day: f64) -> f64 {
    2.0 * std::f64::consts::PI * (day_of_year(t) - peak_day + DAYS_PER_YEAR / 4.0) / DAYS_PER_YEAR
}

/// Serde adapter for `std::time::Duration` as humantime strings ("10s", "7days")
pub mod humantime_duration {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}

/// Serde adapter for optional humantime durations
pub mod humantime_duration_opt {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&humantime::format_duration(*d).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|r| humantime::parse_duration(&r).map_err(de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hour_of_day_fraction() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 13, 30, 0).unwrap();
        assert!((hour_of_day(t) - 13.5).abs() < 1e-9);
    }

    #[test]
    fn test_day_of_year() {
        let t = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(day_of_year(t), 32.0);
    }

    #[test]
    fn test_daily_phase_peaks_at_peak_hour() {
        let noon = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert!((daily_phase(noon, 12.0).sin() - 1.0).abs() < 1e-9);

        let midnight = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!((daily_phase(midnight, 12.0).sin() + 1.0).abs() < 1e-9);
    }
}
