// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Normalizes an entry's `time` metadata value into microseconds, for use
//! as a sort-key tie-breaker in [`crate::sorting`]. Anything that fails
//! to normalize contributes no time (`None`), per the original degrade-
//! silently policy; callers `tracing::warn!` at the point of rejection
//! rather than failing the whole format.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Normalizes a `time` meta value (either a clock-time string or a
/// Unix-timestamp-shaped decimal) combined with the entry's own `date`,
/// to microseconds since the Unix epoch.
#[must_use]
pub fn normalize(value: &str, date: NaiveDate) -> Option<i64> {
    normalize_string(value, date).or_else(|| normalize_decimal(value))
}

fn normalize_string(value: &str, date: NaiveDate) -> Option<i64> {
    let time = NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()?;
    let naive = NaiveDateTime::new(date, time);
    let utc = Utc.from_utc_datetime(&naive);
    Some(utc.timestamp() * 1_000_000 + i64::from(utc.timestamp_subsec_micros()))
}

fn normalize_decimal(value: &str) -> Option<i64> {
    let magnitude: f64 = value.trim().parse().ok()?;
    if magnitude < 0.0 {
        return None;
    }
    let micros = if (1e8..1e10).contains(&magnitude) {
        magnitude * 1_000_000.0
    } else if (1e10..1e13).contains(&magnitude) {
        magnitude * 1_000.0
    } else if (1e13..1e16).contains(&magnitude) {
        magnitude
    } else {
        return None;
    };
    Some(micros.floor() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_hh_mm_ss() {
        let micros = normalize("13:30:00", date(2000, 1, 1)).unwrap();
        assert_eq!(micros, (13 * 3600 + 30 * 60) * 1_000_000);
    }

    #[test]
    fn parses_hh_mm() {
        let micros = normalize("13:30", date(2000, 1, 1)).unwrap();
        assert_eq!(micros, (13 * 3600 + 30 * 60) * 1_000_000);
    }

    #[test]
    fn infers_seconds_magnitude() {
        let micros = normalize("1700000000", date(2000, 1, 1)).unwrap();
        assert_eq!(micros, 1_700_000_000 * 1_000_000);
    }

    #[test]
    fn infers_milliseconds_magnitude() {
        let micros = normalize("17000000000", date(2000, 1, 1)).unwrap();
        assert_eq!(micros, 17_000_000_000 * 1_000);
    }

    #[test]
    fn infers_microseconds_magnitude() {
        let micros = normalize("17000000000000", date(2000, 1, 1)).unwrap();
        assert_eq!(micros, 17_000_000_000_000);
    }

    #[test]
    fn rejects_out_of_band_magnitude() {
        assert_eq!(normalize("42", date(2000, 1, 1)), None);
        assert_eq!(normalize("1e20", date(2000, 1, 1)), None);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(normalize("not-a-time", date(2000, 1, 1)), None);
    }
}
