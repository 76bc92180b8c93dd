//! Per-Ticker Detail Fetcher
//!
//! Builds the rich [`StockRecord`] for one ticker by merging independently
//! fallible sub-fetches: company profile, branding, daily closes (for the
//! 50/200-day averages), the 52-week range, and related companies. A failed
//! sub-fetch leaves its fields `None` without aborting the others. The
//! record is usable only when a ticker symbol was resolved; otherwise the
//! fetch yields no data and no stock row is created. This module never
//! writes to the database.

use crate::constants::{
    CLOSE_LOOKBACK_DAYS, DAY_BAR_LOOKBACK_DAYS, DMA_LONG_WINDOW, DMA_SHORT_WINDOW, EMA_WINDOWS,
    HOUR_BAR_LOOKBACK_DAYS, MINUTE_BAR_LOOKBACK_DAYS, RANGE_LOOKBACK_DAYS,
};
use crate::models::indicators::{align_chart_bars, percent_deviation, round2, sma_latest};
use crate::models::{ChartBar, ChartBarSet, StockMasterRecord, StockRecord, Timespan};
use crate::services::polygon::{PolygonClient, TickerOverview};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

pub struct StockFetcher<'a> {
    client: &'a PolygonClient,
}

impl<'a> StockFetcher<'a> {
    pub fn new(client: &'a PolygonClient) -> Self {
        Self { client }
    }

    /// Best-effort detail fetch for one ticker. `master` is the already
    /// validated snapshot row; without one the ticker is unknown to the
    /// snapshot and no record is produced.
    pub async fn fetch(
        &self,
        ticker: &str,
        master: Option<&StockMasterRecord>,
    ) -> Option<StockRecord> {
        let master = match master {
            Some(master) => master,
            None => {
                debug!(ticker, "no master snapshot row, skipping detail fetch");
                return None;
            }
        };

        let mut stock = StockRecord::from_master(master);

        // (a) profile: failure leaves every profile field unset
        let overview = match self.client.ticker_overview(ticker).await {
            Ok(overview) => Some(overview),
            Err(e) => {
                warn!(ticker, error = %e, "profile fetch failed");
                None
            }
        };
        if let Some(overview) = &overview {
            apply_profile(&mut stock, overview);
        }

        // (b) branding, isolated from the profile fields
        stock.icon_url = overview.as_ref().and_then(resolve_icon_url);

        // (c) daily closes -> moving averages and percent deviation
        match self
            .client
            .daily_closes(ticker, CLOSE_LOOKBACK_DAYS, DMA_LONG_WINDOW)
            .await
        {
            Ok(closes) => apply_indicators(&mut stock, &closes),
            Err(e) => warn!(ticker, error = %e, "daily close fetch failed"),
        }

        // (d) 52-week range
        match self.client.daily_low_high(ticker, RANGE_LOOKBACK_DAYS).await {
            Ok(Some((low, high))) => {
                stock.low_52w = Some(low);
                stock.high_52w = Some(high);
            }
            Ok(None) => debug!(ticker, "no bars in 52-week window"),
            Err(e) => warn!(ticker, error = %e, "52-week range fetch failed"),
        }

        // (e) related companies
        match self.client.related_companies(ticker).await {
            Ok(related) if !related.is_empty() => {
                stock.related_companies = Some(related.join(","));
            }
            Ok(_) => {}
            Err(e) => warn!(ticker, error = %e, "related-companies fetch failed"),
        }

        Some(stock)
    }

    /// Fetch and align chart bars for the three stored granularities. Each
    /// granularity is independent; a failed aggregates call leaves that
    /// series empty.
    pub async fn fetch_chart_bars(&self, ticker: &str) -> ChartBarSet {
        ChartBarSet {
            minute: self
                .fetch_timespan_bars(ticker, Timespan::Minute, MINUTE_BAR_LOOKBACK_DAYS)
                .await,
            hour: self
                .fetch_timespan_bars(ticker, Timespan::Hour, HOUR_BAR_LOOKBACK_DAYS)
                .await,
            day: self
                .fetch_timespan_bars(ticker, Timespan::Day, DAY_BAR_LOOKBACK_DAYS)
                .await,
        }
    }

    async fn fetch_timespan_bars(
        &self,
        ticker: &str,
        timespan: Timespan,
        lookback_days: i64,
    ) -> Vec<ChartBar> {
        let bars = match self.client.aggregate_bars(ticker, timespan, lookback_days).await {
            Ok(bars) => bars,
            Err(e) => {
                warn!(ticker, %timespan, error = %e, "aggregate bar fetch failed");
                return Vec::new();
            }
        };
        if bars.is_empty() {
            return Vec::new();
        }

        let mut series: Vec<Option<HashMap<DateTime<Utc>, f64>>> = Vec::new();
        for window in EMA_WINDOWS {
            match self
                .client
                .ema_series(ticker, timespan, window, lookback_days)
                .await
            {
                Ok(ema) => series.push(Some(ema)),
                Err(e) => {
                    warn!(ticker, %timespan, window, error = %e, "EMA fetch failed");
                    series.push(None);
                }
            }
        }

        align_chart_bars(
            &bars,
            series[0].as_ref(),
            series[1].as_ref(),
            series[2].as_ref(),
        )
    }
}

/// Copy profile fields from the overview onto the record. The overview's
/// name wins over the reference name when present (it is the fuller one).
fn apply_profile(stock: &mut StockRecord, overview: &TickerOverview) {
    if let Some(name) = &overview.name {
        stock.name = name.clone();
    }
    stock.description = overview.description.clone();
    stock.homepage_url = overview.homepage_url.clone();
    stock.industry = overview.industry.clone();
    stock.employees = overview.employees;
    stock.market_cap = overview.market_cap;
    stock.list_date = overview.list_date;
}

/// Branding lookup, isolated from the rest of the profile: any missing
/// piece yields `None` without touching other fields.
fn resolve_icon_url(overview: &TickerOverview) -> Option<String> {
    overview
        .branding
        .as_ref()
        .and_then(|branding| branding.icon_url.clone())
        .filter(|url| !url.is_empty())
}

/// Compute the 50/200-day averages and percent deviation from a
/// newest-first close series. Empty series leaves the fields unset.
fn apply_indicators(stock: &mut StockRecord, closes: &[f64]) {
    stock.dma_50 = sma_latest(closes, DMA_SHORT_WINDOW).map(round2);
    stock.dma_200 = sma_latest(closes, DMA_LONG_WINDOW).map(round2);
    stock.dma_200_perc_diff = match (closes.first(), stock.dma_200) {
        (Some(&last), Some(avg)) => percent_deviation(last, avg),
        _ => None,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::polygon::Branding;

    fn master(ticker: &str) -> StockMasterRecord {
        StockMasterRecord {
            ticker: ticker.to_string(),
            name: "Apple Inc.".to_string(),
            ticker_type: Some("Common Stock".to_string()),
            primary_exchange: "XNAS".to_string(),
            snapshot_at: Utc::now(),
            day_open: 210.0,
            day_high: 214.5,
            day_low: 209.1,
            day_close: 212.3,
            volume: 48_000_000,
            todays_change: 2.3,
            todays_change_perc: 1.09,
        }
    }

    fn overview(with_branding: bool) -> TickerOverview {
        TickerOverview {
            ticker: "AAPL".to_string(),
            name: Some("Apple Inc.".to_string()),
            description: Some("Designs smartphones.".to_string()),
            homepage_url: Some("https://www.apple.com".to_string()),
            industry: Some("Electronic Computers".to_string()),
            employees: Some(164_000),
            market_cap: Some(3.2e12),
            list_date: None,
            branding: with_branding.then(|| Branding {
                icon_url: Some("https://img.example/AAPL/icon.png".to_string()),
            }),
        }
    }

    #[test]
    fn test_branding_failure_leaves_profile_intact() {
        let mut stock = StockRecord::from_master(&master("AAPL"));
        let overview = overview(false);
        apply_profile(&mut stock, &overview);
        stock.icon_url = resolve_icon_url(&overview);

        assert!(stock.icon_url.is_none());
        assert_eq!(stock.name, "Apple Inc.");
        assert_eq!(stock.description.as_deref(), Some("Designs smartphones."));
    }

    #[test]
    fn test_branding_resolves_when_present() {
        assert_eq!(
            resolve_icon_url(&overview(true)).as_deref(),
            Some("https://img.example/AAPL/icon.png")
        );
    }

    #[test]
    fn test_indicators_from_constant_series() {
        let mut stock = StockRecord::from_master(&master("AAPL"));
        apply_indicators(&mut stock, &vec![100.0; 200]);
        assert_eq!(stock.dma_50, Some(100.0));
        assert_eq!(stock.dma_200, Some(100.0));
        assert_eq!(stock.dma_200_perc_diff, Some(0.0));
    }

    #[test]
    fn test_indicators_deviation_sign() {
        let mut stock = StockRecord::from_master(&master("AAPL"));
        // Last close 110 on top of a series averaging 100
        let mut closes = vec![110.0];
        closes.extend(std::iter::repeat(100.0).take(10));
        apply_indicators(&mut stock, &closes);
        let dma = stock.dma_200.unwrap();
        let expected = percent_deviation(110.0, dma).unwrap();
        assert_eq!(stock.dma_200_perc_diff, Some(expected));
        assert!(expected > 0.0);
    }

    #[test]
    fn test_indicators_empty_series() {
        let mut stock = StockRecord::from_master(&master("AAPL"));
        apply_indicators(&mut stock, &[]);
        assert!(stock.dma_50.is_none());
        assert!(stock.dma_200.is_none());
        assert!(stock.dma_200_perc_diff.is_none());
    }
}
