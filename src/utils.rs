//! Shared helpers: data directory resolution and Eastern-time date math.
//!
//! The provider reports epoch timestamps at different granularities per
//! endpoint (nanoseconds on snapshots, milliseconds on aggregates and EMA
//! values). All conversion into US-Eastern calendar dates goes through
//! [`eastern_date_from_epoch`] so the unit is always explicit at the call
//! site.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use std::path::PathBuf;

/// Epoch granularity used by a provider field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampUnit {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

/// Convert a provider epoch value into a UTC datetime.
/// Returns `None` for values outside chrono's representable range.
pub fn datetime_from_epoch(value: i64, unit: TimestampUnit) -> Option<DateTime<Utc>> {
    let (secs, nanos) = match unit {
        TimestampUnit::Seconds => (value, 0u32),
        TimestampUnit::Millis => (
            value.div_euclid(1_000),
            (value.rem_euclid(1_000) * 1_000_000) as u32,
        ),
        TimestampUnit::Micros => (
            value.div_euclid(1_000_000),
            (value.rem_euclid(1_000_000) * 1_000) as u32,
        ),
        TimestampUnit::Nanos => (
            value.div_euclid(1_000_000_000),
            value.rem_euclid(1_000_000_000) as u32,
        ),
    };
    match Utc.timestamp_opt(secs, nanos) {
        chrono::LocalResult::Single(dt) => Some(dt),
        _ => None,
    }
}

/// US-Eastern calendar date of a UTC instant. Day boundaries follow the
/// exchange timezone, not UTC.
pub fn eastern_date(dt: DateTime<Utc>) -> NaiveDate {
    dt.with_timezone(&New_York).date_naive()
}

/// UTC instant of midnight Eastern on the given date. On a DST transition
/// the earliest valid local time wins.
pub fn eastern_day_start(date: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    New_York
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a UTC instant for display: 'Friday, Jun 21, 2025, at 08:00PM, ET.'
pub fn format_eastern(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&New_York)
        .format("%A, %b %d, %Y, at %I:%M%p, ET.")
        .to_string()
}

/// Get the data directory (markers, default database location) from the
/// environment or use the default
pub fn get_data_dir() -> PathBuf {
    std::env::var("STOCKTRACKER_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Get the SQLite database path from the environment or use the default
/// inside the data directory
pub fn get_database_path() -> PathBuf {
    std::env::var("STOCKTRACKER_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| get_data_dir().join("stocktracker.db"))
}
