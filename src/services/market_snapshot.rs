//! Market Snapshot Fetcher
//!
//! Joins the provider's bulk snapshot with the reference-ticker listing
//! (name, type code, exchange) into validated [`StockMasterRecord`]s. A
//! record missing any required field is excluded rather than inserted as a
//! partial row; an unresolved type code resolves to a `None` description
//! without failing the record. A failed bulk call degrades to an empty map
//! so the refresh cycle can proceed with zero master rows.

use crate::models::{MasterMap, StockMasterRecord};
use crate::services::polygon::{PolygonClient, ReferenceTicker, SnapshotTicker};
use crate::utils::{datetime_from_epoch, TimestampUnit};
use std::collections::HashMap;
use tracing::{info, warn};

/// Fetch and validate the full market snapshot. Never fails: upstream
/// errors are logged and yield an empty map.
pub async fn fetch_master_records(client: &PolygonClient) -> MasterMap {
    let snapshot = match client.full_market_snapshot().await {
        Ok(tickers) => tickers,
        Err(e) => {
            warn!(error = %e, "bulk snapshot fetch failed, continuing with zero master rows");
            return MasterMap::new();
        }
    };

    let reference = match client.reference_tickers().await {
        Ok(listing) => listing,
        Err(e) => {
            warn!(error = %e, "reference listing fetch failed, continuing with zero master rows");
            return MasterMap::new();
        }
    };

    // Type lookup is auxiliary: a failure leaves every description unresolved
    let type_lookup = match client.ticker_types().await {
        Ok(lookup) => lookup,
        Err(e) => {
            warn!(error = %e, "ticker-type lookup failed, type descriptions left unresolved");
            HashMap::new()
        }
    };

    let reference_by_ticker: HashMap<&str, &ReferenceTicker> = reference
        .iter()
        .map(|entry| (entry.ticker.as_str(), entry))
        .collect();

    let total = snapshot.len();
    let mut masters = MasterMap::new();
    let mut dropped = 0usize;

    for entry in &snapshot {
        let reference = reference_by_ticker.get(entry.ticker.as_str()).copied();
        match master_from_parts(entry, reference, &type_lookup) {
            Some(record) => {
                masters.insert(record.ticker.clone(), record);
            }
            None => dropped += 1,
        }
    }

    info!(
        snapshot_entries = total,
        master_rows = masters.len(),
        dropped,
        "market snapshot validated"
    );
    masters
}

/// Validate one snapshot entry against its reference metadata. `None` when
/// any required field is missing.
pub fn master_from_parts(
    snapshot: &SnapshotTicker,
    reference: Option<&ReferenceTicker>,
    type_lookup: &HashMap<String, String>,
) -> Option<StockMasterRecord> {
    if snapshot.ticker.is_empty() {
        return None;
    }
    let reference = reference?;
    let name = reference.name.clone()?;
    let primary_exchange = reference.primary_exchange.clone()?;
    let type_code = reference.ticker_type.as_deref()?;
    // Unresolved code -> null description, not a dropped record
    let ticker_type = type_lookup.get(type_code).cloned();

    let day = snapshot.day.as_ref()?;
    let snapshot_at = datetime_from_epoch(snapshot.updated?, TimestampUnit::Nanos)?;

    Some(StockMasterRecord {
        ticker: snapshot.ticker.clone(),
        name,
        ticker_type,
        primary_exchange,
        snapshot_at,
        day_open: day.o?,
        day_high: day.h?,
        day_low: day.l?,
        day_close: day.c?,
        volume: day.v? as u64,
        todays_change: snapshot.todays_change?,
        todays_change_perc: snapshot.todays_change_perc?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::polygon::DayBar;

    fn snapshot_entry(ticker: &str) -> SnapshotTicker {
        SnapshotTicker {
            ticker: ticker.to_string(),
            todays_change: Some(2.31),
            todays_change_perc: Some(1.09),
            updated: Some(1_718_928_000_000_000_000),
            day: Some(DayBar {
                o: Some(210.0),
                h: Some(214.5),
                l: Some(209.1),
                c: Some(212.3),
                v: Some(48_123_456.0),
            }),
        }
    }

    fn reference_entry(ticker: &str) -> ReferenceTicker {
        ReferenceTicker {
            ticker: ticker.to_string(),
            name: Some("Apple Inc.".to_string()),
            ticker_type: Some("CS".to_string()),
            primary_exchange: Some("XNAS".to_string()),
        }
    }

    fn types() -> HashMap<String, String> {
        [("CS".to_string(), "Common Stock".to_string())].into()
    }

    #[test]
    fn test_complete_record_validates() {
        let record = master_from_parts(
            &snapshot_entry("AAPL"),
            Some(&reference_entry("AAPL")),
            &types(),
        )
        .unwrap();
        assert_eq!(record.ticker, "AAPL");
        assert_eq!(record.ticker_type.as_deref(), Some("Common Stock"));
        assert_eq!(record.volume, 48_123_456);
        assert_eq!(record.day_close, 212.3);
    }

    #[test]
    fn test_missing_volume_drops_record() {
        let mut entry = snapshot_entry("AAPL");
        entry.day.as_mut().unwrap().v = None;
        assert!(master_from_parts(&entry, Some(&reference_entry("AAPL")), &types()).is_none());
    }

    #[test]
    fn test_missing_reference_metadata_drops_record() {
        assert!(master_from_parts(&snapshot_entry("AAPL"), None, &types()).is_none());

        let mut reference = reference_entry("AAPL");
        reference.name = None;
        assert!(master_from_parts(&snapshot_entry("AAPL"), Some(&reference), &types()).is_none());
    }

    #[test]
    fn test_unresolved_type_code_maps_to_null() {
        let record = master_from_parts(
            &snapshot_entry("AAPL"),
            Some(&reference_entry("AAPL")),
            &HashMap::new(),
        )
        .unwrap();
        assert!(record.ticker_type.is_none());
    }
}
