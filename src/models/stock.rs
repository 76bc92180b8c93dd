use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One row of the bulk market snapshot, joined with reference metadata.
///
/// Every field except `ticker_type` is required: a snapshot record missing
/// any of them is dropped by the fetcher instead of being inserted as a
/// partial row. `ticker_type` holds the resolved type description and is
/// `None` when the provider's type code has no entry in the code lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMasterRecord {
    /// Ticker symbol (unique key)
    pub ticker: String,

    /// Company name from the reference listing
    pub name: String,

    /// Resolved ticker-type description (e.g. "Common Stock")
    pub ticker_type: Option<String>,

    /// Primary listing exchange code
    pub primary_exchange: String,

    /// Instant the provider last updated this snapshot entry
    pub snapshot_at: DateTime<Utc>,

    pub day_open: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub day_close: f64,

    /// Day trading volume (shares)
    pub volume: u64,

    /// Absolute change since the previous close
    pub todays_change: f64,

    /// Percent change since the previous close
    pub todays_change_perc: f64,
}

/// Rich per-ticker record, created lazily for index constituents and
/// top-movers tickers only. Merges the master snapshot fields with profile
/// data and computed indicators; profile fields are best-effort and stay
/// `None` when their sub-fetch failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRecord {
    pub ticker: String,
    pub name: String,

    // Snapshot fields, copied from the master record
    pub snapshot_at: DateTime<Utc>,
    pub day_open: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub day_close: f64,
    pub volume: u64,
    pub todays_change: f64,
    pub todays_change_perc: f64,

    // Profile
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    pub industry: Option<String>,
    pub employees: Option<u64>,
    pub market_cap: Option<f64>,
    pub icon_url: Option<String>,
    pub list_date: Option<NaiveDate>,

    // Indicators
    pub dma_50: Option<f64>,
    pub dma_200: Option<f64>,
    pub dma_200_perc_diff: Option<f64>,
    pub low_52w: Option<f64>,
    pub high_52w: Option<f64>,

    /// Comma-joined related-company tickers
    pub related_companies: Option<String>,
}

impl StockRecord {
    /// Start a rich record from its master snapshot row. Profile and
    /// indicator fields are filled in by the detail fetcher.
    pub fn from_master(master: &StockMasterRecord) -> Self {
        Self {
            ticker: master.ticker.clone(),
            name: master.name.clone(),
            snapshot_at: master.snapshot_at,
            day_open: master.day_open,
            day_high: master.day_high,
            day_low: master.day_low,
            day_close: master.day_close,
            volume: master.volume,
            todays_change: master.todays_change,
            todays_change_perc: master.todays_change_perc,
            description: None,
            homepage_url: None,
            industry: None,
            employees: None,
            market_cap: None,
            icon_url: None,
            list_date: None,
            dma_50: None,
            dma_200: None,
            dma_200_perc_diff: None,
            low_52w: None,
            high_52w: None,
            related_companies: None,
        }
    }

    /// Related-company tickers as a list (empty when none were fetched)
    pub fn related_tickers(&self) -> Vec<String> {
        self.related_companies
            .as_deref()
            .map(|joined| {
                joined
                    .split(',')
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
