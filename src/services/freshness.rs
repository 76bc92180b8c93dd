//! On-disk freshness marker and market-open gate
//!
//! Two small JSON records under the data directory, shared with the web
//! layer: `populate_info.json` holds the last successful refresh instant
//! plus its Eastern trading date (bounds chart queries), and
//! `market_status.json` holds the provider-reported market status consulted
//! before a refresh is attempted.

use crate::error::{AppError, Result};
use crate::utils::eastern_date;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const REFRESH_MARKER_FILE: &str = "populate_info.json";
const MARKET_STATUS_FILE: &str = "market_status.json";

/// Last successful refresh, written only after the atomic commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshMarker {
    /// Commit instant, RFC3339 UTC
    pub last_updated: DateTime<Utc>,
    /// Eastern calendar date of the commit; the last known trading day
    pub last_updated_date: NaiveDate,
}

/// Provider market status as last persisted by the `market-status` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStatusRecord {
    pub market_status: String,
    pub server_time: String,
}

impl MarketStatusRecord {
    pub fn is_open(&self) -> bool {
        self.market_status == "open"
    }
}

fn marker_path(data_dir: &Path) -> PathBuf {
    data_dir.join(REFRESH_MARKER_FILE)
}

fn status_path(data_dir: &Path) -> PathBuf {
    data_dir.join(MARKET_STATUS_FILE)
}

/// Persist the refresh marker for the given commit instant
pub fn write_refresh_marker(data_dir: &Path, committed_at: DateTime<Utc>) -> Result<RefreshMarker> {
    let marker = RefreshMarker {
        last_updated: committed_at,
        last_updated_date: eastern_date(committed_at),
    };
    write_json(&marker_path(data_dir), &marker)?;
    Ok(marker)
}

/// Read the refresh marker; `None` when missing or unreadable
pub fn read_refresh_marker(data_dir: &Path) -> Option<RefreshMarker> {
    read_json(&marker_path(data_dir))
}

/// Persist the market-open gate
pub fn write_market_status(data_dir: &Path, record: &MarketStatusRecord) -> Result<()> {
    write_json(&status_path(data_dir), record)
}

/// Read the market-open gate; `None` when missing or unreadable
pub fn read_market_status(data_dir: &Path) -> Option<MarketStatusRecord> {
    read_json(&status_path(data_dir))
}

/// Gate decision for the refresh command. A missing gate file counts as
/// closed; populating it is the `market-status` command's job.
pub fn is_market_open(data_dir: &Path) -> bool {
    match read_market_status(data_dir) {
        Some(record) => record.is_open(),
        None => {
            warn!("no market-status record, treating market as closed");
            false
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Io(format!("cannot create {}: {}", parent.display(), e)))?;
    }
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body)
        .map_err(|e| AppError::Io(format!("cannot write {}: {}", path.display(), e)))?;
    debug!(path = %path.display(), "marker written");
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let body = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&body) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "marker file did not parse");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_refresh_marker_round_trip() {
        let dir = tempdir().unwrap();
        // 2025-06-21 00:00 UTC is Friday evening 2025-06-20 in New York
        let committed_at = Utc.timestamp_opt(1_750_464_000, 0).unwrap();

        let written = write_refresh_marker(dir.path(), committed_at).unwrap();
        assert_eq!(
            written.last_updated_date,
            NaiveDate::from_ymd_opt(2025, 6, 20).unwrap()
        );

        let read = read_refresh_marker(dir.path()).unwrap();
        assert_eq!(read, written);
    }

    #[test]
    fn test_missing_marker_is_none() {
        let dir = tempdir().unwrap();
        assert!(read_refresh_marker(dir.path()).is_none());
    }

    #[test]
    fn test_gate_defaults_to_closed() {
        let dir = tempdir().unwrap();
        assert!(!is_market_open(dir.path()));
    }

    #[test]
    fn test_gate_reflects_persisted_status() {
        let dir = tempdir().unwrap();
        let record = MarketStatusRecord {
            market_status: "open".to_string(),
            server_time: "2025-06-20T14:30:00-04:00".to_string(),
        };
        write_market_status(dir.path(), &record).unwrap();
        assert!(is_market_open(dir.path()));

        let record = MarketStatusRecord {
            market_status: "closed".to_string(),
            server_time: "2025-06-20T20:30:00-04:00".to_string(),
        };
        write_market_status(dir.path(), &record).unwrap();
        assert!(!is_market_open(dir.path()));
    }
}
