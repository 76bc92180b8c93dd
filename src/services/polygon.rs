//! Market-data provider client (Polygon-style REST API)
//!
//! Read-only surface over the endpoints the pipeline consumes: the bulk
//! market snapshot, the reference-ticker listing and type lookup, per-ticker
//! details and related companies, aggregate bars, the EMA indicator
//! endpoint, and the market-status endpoint. The API key comes from the
//! environment and is appended to every request.

use crate::constants::{AGG_RESULT_LIMIT, HTTP_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::models::{RawBar, Timespan};
use crate::utils::{datetime_from_epoch, TimestampUnit};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// Hard cap on reference-listing pages followed via `next_url`
const MAX_REFERENCE_PAGES: usize = 50;

/// One entry of the bulk snapshot, as returned by the provider. All value
/// fields are optional on the wire; validation happens at the
/// market-snapshot layer, not here.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotTicker {
    pub ticker: String,
    #[serde(rename = "todaysChange")]
    pub todays_change: Option<f64>,
    #[serde(rename = "todaysChangePerc")]
    pub todays_change_perc: Option<f64>,
    /// Last-update instant, epoch nanoseconds
    pub updated: Option<i64>,
    pub day: Option<DayBar>,
}

/// Current-day OHLCV block inside a snapshot entry
#[derive(Debug, Clone, Deserialize)]
pub struct DayBar {
    pub o: Option<f64>,
    pub h: Option<f64>,
    pub l: Option<f64>,
    pub c: Option<f64>,
    pub v: Option<f64>,
}

/// One row of the reference-ticker listing (name/type/exchange metadata)
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceTicker {
    pub ticker: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ticker_type: Option<String>,
    pub primary_exchange: Option<String>,
}

/// Company profile and branding from the ticker-details endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TickerOverview {
    pub ticker: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    #[serde(rename = "sic_description")]
    pub industry: Option<String>,
    #[serde(rename = "total_employees")]
    pub employees: Option<u64>,
    pub market_cap: Option<f64>,
    pub list_date: Option<NaiveDate>,
    pub branding: Option<Branding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Branding {
    pub icon_url: Option<String>,
}

/// Current market status from the provider
#[derive(Debug, Clone, Deserialize)]
pub struct MarketStatus {
    pub market: String,
    #[serde(rename = "serverTime")]
    pub server_time: String,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    #[serde(default)]
    tickers: Vec<SnapshotTicker>,
}

#[derive(Debug, Deserialize)]
struct ReferenceResponse {
    #[serde(default)]
    results: Vec<ReferenceTicker>,
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TypesResponse {
    #[serde(default)]
    results: Vec<TypeEntry>,
}

#[derive(Debug, Deserialize)]
struct TypeEntry {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OverviewResponse {
    results: TickerOverview,
}

#[derive(Debug, Deserialize)]
struct RelatedResponse {
    #[serde(default)]
    results: Vec<RelatedEntry>,
}

#[derive(Debug, Deserialize)]
struct RelatedEntry {
    ticker: String,
}

#[derive(Debug, Deserialize)]
struct AggsResponse {
    #[serde(default)]
    results: Vec<AggBar>,
}

/// One aggregate bar on the wire; `t` is epoch milliseconds
#[derive(Debug, Clone, Deserialize)]
struct AggBar {
    t: i64,
    c: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    v: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EmaResponse {
    results: Option<EmaResults>,
}

#[derive(Debug, Deserialize)]
struct EmaResults {
    #[serde(default)]
    values: Vec<EmaValue>,
}

/// One EMA observation; `timestamp` is epoch milliseconds
#[derive(Debug, Clone, Deserialize)]
struct EmaValue {
    timestamp: i64,
    value: Option<f64>,
}

/// Client over the market-data provider's REST API
pub struct PolygonClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PolygonClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Build the client against an explicit base URL
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::Config("empty provider API key".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Read `POLYGON_API_KEY` from the environment
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("POLYGON_API_KEY")
            .map_err(|_| AppError::Config("POLYGON_API_KEY is not set".to_string()))?;
        Self::new(api_key)
    }

    /// GET a path relative to the base URL and decode the JSON body.
    /// `url` may also be an absolute pagination URL returned by the
    /// provider (`next_url`); the API key is appended either way.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let absolute = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}{}", self.base_url, url)
        };
        let separator = if absolute.contains('?') { '&' } else { '?' };
        let full = format!("{}{}apiKey={}", absolute, separator, self.api_key);

        debug!(url = %absolute, "provider request");
        let response = self.client.get(&full).send().await.map_err(|e| {
            AppError::Network(format!("request failed: {} (url: {})", e, absolute))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Network(format!(
                "provider returned {} for {}",
                status, absolute
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Network(format!("failed to read body: {}", e)))?;
        serde_json::from_str(&body)
            .map_err(|e| AppError::Parse(format!("unexpected response shape: {}", e)))
    }

    /// Current market status (open/closed plus the provider's server time)
    pub async fn market_status(&self) -> Result<MarketStatus> {
        self.get_json("/v1/marketstatus/now").await
    }

    /// Bulk snapshot of every tradable U.S. stock ticker
    pub async fn full_market_snapshot(&self) -> Result<Vec<SnapshotTicker>> {
        let response: SnapshotResponse = self
            .get_json("/v2/snapshot/locale/us/markets/stocks/tickers")
            .await?;
        Ok(response.tickers)
    }

    /// Full reference listing (ticker, name, type code, exchange),
    /// following the provider's cursor pagination
    pub async fn reference_tickers(&self) -> Result<Vec<ReferenceTicker>> {
        let mut all = Vec::new();
        let mut url = "/v3/reference/tickers?market=stocks&active=true&limit=1000".to_string();

        for page in 0..MAX_REFERENCE_PAGES {
            let response: ReferenceResponse = self.get_json(&url).await?;
            all.extend(response.results);
            match response.next_url {
                Some(next) => url = next,
                None => return Ok(all),
            }
            debug!(page = page + 1, total = all.len(), "reference listing page");
        }
        warn!(
            pages = MAX_REFERENCE_PAGES,
            "reference listing pagination cap reached"
        );
        Ok(all)
    }

    /// Ticker-type code -> description lookup
    pub async fn ticker_types(&self) -> Result<HashMap<String, String>> {
        let response: TypesResponse = self
            .get_json("/v3/reference/tickers/types?asset_class=stocks")
            .await?;
        Ok(response
            .results
            .into_iter()
            .map(|entry| (entry.code, entry.description))
            .collect())
    }

    /// Company profile, branding, and listing metadata for one ticker
    pub async fn ticker_overview(&self, ticker: &str) -> Result<TickerOverview> {
        let response: OverviewResponse = self
            .get_json(&format!("/v3/reference/tickers/{}", ticker))
            .await?;
        Ok(response.results)
    }

    /// Tickers of companies the provider relates to the given one
    pub async fn related_companies(&self, ticker: &str) -> Result<Vec<String>> {
        let response: RelatedResponse = self
            .get_json(&format!("/v1/related-companies/{}", ticker))
            .await?;
        Ok(response.results.into_iter().map(|r| r.ticker).collect())
    }

    /// Daily close prices over the trailing lookback window, newest-first,
    /// capped at `limit` entries
    pub async fn daily_closes(
        &self,
        ticker: &str,
        lookback_days: i64,
        limit: usize,
    ) -> Result<Vec<f64>> {
        let (from, to) = lookback_window(lookback_days);
        let url = format!(
            "/v2/aggs/ticker/{}/range/1/day/{}/{}?adjusted=true&sort=desc&limit={}",
            ticker, from, to, AGG_RESULT_LIMIT
        );
        let response: AggsResponse = self.get_json(&url).await?;
        Ok(response
            .results
            .iter()
            .filter_map(|bar| bar.c)
            .take(limit)
            .collect())
    }

    /// Lowest low and highest high over the trailing lookback window.
    /// `None` when the window holds no bars.
    pub async fn daily_low_high(
        &self,
        ticker: &str,
        lookback_days: i64,
    ) -> Result<Option<(f64, f64)>> {
        let (from, to) = lookback_window(lookback_days);
        let url = format!(
            "/v2/aggs/ticker/{}/range/1/day/{}/{}?adjusted=true&sort=desc&limit={}",
            ticker, from, to, AGG_RESULT_LIMIT
        );
        let response: AggsResponse = self.get_json(&url).await?;

        let mut low: Option<f64> = None;
        let mut high: Option<f64> = None;
        for bar in &response.results {
            if let Some(l) = bar.l {
                low = Some(low.map_or(l, |cur: f64| cur.min(l)));
            }
            if let Some(h) = bar.h {
                high = Some(high.map_or(h, |cur: f64| cur.max(h)));
            }
        }
        Ok(low.zip(high))
    }

    /// Aggregate bars (close + volume) at the given granularity over the
    /// trailing lookback window, oldest-first. Bars missing a close are
    /// dropped here; a missing volume counts as zero traded shares.
    pub async fn aggregate_bars(
        &self,
        ticker: &str,
        timespan: Timespan,
        lookback_days: i64,
    ) -> Result<Vec<RawBar>> {
        let (from, to) = lookback_window(lookback_days);
        let url = format!(
            "/v2/aggs/ticker/{}/range/1/{}/{}/{}?adjusted=true&sort=asc&limit={}",
            ticker,
            timespan.as_str(),
            from,
            to,
            AGG_RESULT_LIMIT
        );
        let response: AggsResponse = self.get_json(&url).await?;
        Ok(response
            .results
            .iter()
            .filter_map(|bar| {
                let ts = datetime_from_epoch(bar.t, TimestampUnit::Millis)?;
                Some(RawBar {
                    ts,
                    close: bar.c?,
                    volume: bar.v.unwrap_or(0.0) as u64,
                })
            })
            .collect())
    }

    /// EMA series for one window at the given granularity, keyed by bar
    /// timestamp
    pub async fn ema_series(
        &self,
        ticker: &str,
        timespan: Timespan,
        window: u32,
        lookback_days: i64,
    ) -> Result<HashMap<DateTime<Utc>, f64>> {
        let (from, _) = lookback_window(lookback_days);
        let url = format!(
            "/v1/indicators/ema/{}?timespan={}&window={}&series_type=close&order=asc&limit={}&timestamp.gte={}",
            ticker,
            timespan.as_str(),
            window,
            AGG_RESULT_LIMIT,
            from
        );
        let response: EmaResponse = self.get_json(&url).await?;
        Ok(response
            .results
            .map(|results| {
                results
                    .values
                    .iter()
                    .filter_map(|entry| {
                        let ts = datetime_from_epoch(entry.timestamp, TimestampUnit::Millis)?;
                        Some((ts, entry.value?))
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// (from, to) dates for a trailing calendar-day window ending today
fn lookback_window(lookback_days: i64) -> (String, String) {
    let to = Utc::now().date_naive();
    let from = to - Duration::days(lookback_days);
    (
        from.format("%Y-%m-%d").to_string(),
        to.format("%Y-%m-%d").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_response_decodes_partial_entries() {
        let body = r#"{
            "tickers": [
                {
                    "ticker": "AAPL",
                    "todaysChange": 2.31,
                    "todaysChangePerc": 1.09,
                    "updated": 1718928000000000000,
                    "day": {"o": 210.0, "h": 214.5, "l": 209.1, "c": 212.3, "v": 48123456.0}
                },
                {"ticker": "XXXX"}
            ]
        }"#;
        let response: SnapshotResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.tickers.len(), 2);
        assert_eq!(response.tickers[0].day.as_ref().unwrap().c, Some(212.3));
        assert!(response.tickers[1].day.is_none());
    }

    #[test]
    fn test_overview_decodes_branding_and_dates() {
        let body = r#"{
            "results": {
                "ticker": "AAPL",
                "name": "Apple Inc.",
                "description": "Designs smartphones.",
                "homepage_url": "https://www.apple.com",
                "sic_description": "Electronic Computers",
                "total_employees": 164000,
                "market_cap": 3.2e12,
                "list_date": "1980-12-12",
                "branding": {"icon_url": "https://img.example/AAPL/icon.png"}
            }
        }"#;
        let response: OverviewResponse = serde_json::from_str(body).unwrap();
        let overview = response.results;
        assert_eq!(overview.industry.as_deref(), Some("Electronic Computers"));
        assert_eq!(
            overview.list_date,
            NaiveDate::from_ymd_opt(1980, 12, 12)
        );
        assert!(overview.branding.unwrap().icon_url.is_some());
    }

    #[test]
    fn test_ema_response_tolerates_missing_results() {
        let response: EmaResponse = serde_json::from_str("{}").unwrap();
        assert!(response.results.is_none());

        let body = r#"{"results": {"values": [{"timestamp": 1718928000000, "value": 211.4}]}}"#;
        let response: EmaResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.results.unwrap().values.len(), 1);
    }

    #[test]
    fn test_types_response_builds_lookup() {
        let body = r#"{"results": [
            {"code": "CS", "description": "Common Stock"},
            {"code": "ETF", "description": "Exchange Traded Fund"}
        ]}"#;
        let response: TypesResponse = serde_json::from_str(body).unwrap();
        let lookup: HashMap<String, String> = response
            .results
            .into_iter()
            .map(|e| (e.code, e.description))
            .collect();
        assert_eq!(lookup.get("CS").map(String::as_str), Some("Common Stock"));
    }
}
