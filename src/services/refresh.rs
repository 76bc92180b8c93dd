//! Reconciliation & Atomic Replace Engine
//!
//! Runs one refresh cycle: stage everything in memory, commit once.
//!
//! STAGING — fetch the bulk snapshot into master rows, scrape each index's
//! holdings, and fetch per-ticker detail plus chart bars for every distinct
//! constituent. An in-memory seen-set guarantees a ticker is fetched at
//! most once per cycle. COMMITTING — a single transaction replaces the
//! whole dataset (see [`Database::replace_all`]); on any error the
//! transaction rolls back and the error propagates, leaving readers on the
//! previous dataset. There are no retries here: re-running the cycle is the
//! scheduler's job.
//!
//! After a successful commit the engine records the freshness marker, then
//! runs the top-movers pass: rankings are computed from the committed
//! tables, persisted, and any ranked ticker without a stock row is fetched
//! and appended in a follow-up commit.
//!
//! All staging state lives in a [`RefreshStaging`] value owned by the
//! cycle; nothing is process-global, so a second cycle cannot share or
//! corrupt a running cycle's state.

use crate::constants::{INDEX_SPECS, SLICK_CHARTS_URL, UNKNOWN_TICKER};
use crate::error::Result;
use crate::models::{
    ChartBarSet, IndexRecord, MasterMap, ScrapedHolding, StockRecord,
};
use crate::services::database::{Database, ReplaceStats};
use crate::services::index_scraper::IndexScraper;
use crate::services::market_snapshot;
use crate::services::polygon::PolygonClient;
use crate::services::stock_fetcher::StockFetcher;
use crate::services::{freshness, top_movers};
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything staged for one cycle's atomic commit
#[derive(Default)]
pub struct RefreshStaging {
    pub masters: MasterMap,
    pub indices: Vec<(IndexRecord, Vec<ScrapedHolding>)>,
    pub stocks: Vec<StockRecord>,
    pub charts: Vec<(String, ChartBarSet)>,
    seen: HashSet<String>,
}

impl RefreshStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a ticker as visited this cycle. Returns `true` the first
    /// time, `false` for every repeat — the caller must not fetch again.
    pub fn mark_seen(&mut self, ticker: &str) -> bool {
        self.seen.insert(ticker.to_string())
    }

    pub fn was_seen(&self, ticker: &str) -> bool {
        self.seen.contains(ticker)
    }
}

/// Outcome of one refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub replace: ReplaceStats,
    pub mover_scopes: usize,
    pub mover_rows: usize,
    pub appended_stocks: usize,
}

pub struct RefreshEngine<'a> {
    db: &'a Database,
    client: &'a PolygonClient,
    scraper: &'a IndexScraper,
    data_dir: PathBuf,
}

impl<'a> RefreshEngine<'a> {
    pub fn new(
        db: &'a Database,
        client: &'a PolygonClient,
        scraper: &'a IndexScraper,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            db,
            client,
            scraper,
            data_dir,
        }
    }

    /// Run one full refresh cycle. Per-ticker and per-index failures are
    /// absorbed during staging; only the commit step is fatal.
    pub async fn run(&self) -> Result<RefreshSummary> {
        let mut staging = RefreshStaging::new();
        let fetcher = StockFetcher::new(self.client);
        let cycle_started = Utc::now();

        staging.masters = market_snapshot::fetch_master_records(self.client).await;

        for spec in INDEX_SPECS {
            let url = spec.url(SLICK_CHARTS_URL);
            let holdings = self.scraper.fetch_holdings(&url).await;
            info!(index = spec.slug, holdings = holdings.len(), "index staged");

            for holding in &holdings {
                self.stage_constituent(&mut staging, &fetcher, &holding.ticker)
                    .await;
            }

            staging
                .indices
                .push((IndexRecord::from_spec(spec, SLICK_CHARTS_URL, cycle_started), holdings));
        }

        // The one fatal step: full replacement in a single transaction
        let replace = self.db.replace_all(
            &sorted_masters(&staging.masters),
            &staging.indices,
            &staging.stocks,
            &staging.charts,
        )
        .await?;

        let marker = freshness::write_refresh_marker(&self.data_dir, Utc::now())?;
        info!(last_updated_date = %marker.last_updated_date, "refresh marker written");

        // Second pass: rankings from the committed tables, then backfill
        // stock rows for ranked tickers the index scan never visited.
        let movers = top_movers::compute(self.db).await?;
        let mover_rows = self.db.replace_top_movers(&movers).await?;
        let appended_stocks = self.backfill_mover_stocks(&mut staging, &fetcher).await?;

        Ok(RefreshSummary {
            replace,
            mover_scopes: movers.len(),
            mover_rows,
            appended_stocks,
        })
    }

    /// Fetch detail and chart bars for one constituent ticker, at most once
    /// per cycle. Sentinel and already-seen tickers are skipped; a ticker
    /// without a master row never produces a stock row.
    async fn stage_constituent(
        &self,
        staging: &mut RefreshStaging,
        fetcher: &StockFetcher<'_>,
        ticker: &str,
    ) {
        if ticker == UNKNOWN_TICKER {
            return;
        }
        if !staging.mark_seen(ticker) {
            return;
        }

        let master = staging.masters.get(ticker).cloned();
        match fetcher.fetch(ticker, master.as_ref()).await {
            Some(stock) => {
                let bars = fetcher.fetch_chart_bars(ticker).await;
                if !bars.is_empty() {
                    staging.charts.push((ticker.to_string(), bars));
                }
                staging.stocks.push(stock);
            }
            None => {
                warn!(ticker, "no usable detail record, stock row skipped");
            }
        }
    }

    /// Ensure every top-movers ticker has a fully-fetched stock row. Tickers
    /// already visited this cycle are not fetched again.
    async fn backfill_mover_stocks(
        &self,
        staging: &mut RefreshStaging,
        fetcher: &StockFetcher<'_>,
    ) -> Result<usize> {
        let missing = self.db.movers_without_stock_rows().await?;
        if missing.is_empty() {
            return Ok(0);
        }
        info!(count = missing.len(), "backfilling stock rows for ranked tickers");

        let mut extra_stocks = Vec::new();
        let mut extra_charts = Vec::new();
        for ticker in &missing {
            if staging.was_seen(ticker) {
                // Already tried during index staging and yielded no data
                continue;
            }
            staging.mark_seen(ticker);
            let master = staging.masters.get(ticker.as_str()).cloned();
            if let Some(stock) = fetcher.fetch(ticker, master.as_ref()).await {
                let bars = fetcher.fetch_chart_bars(ticker).await;
                if !bars.is_empty() {
                    extra_charts.push((ticker.clone(), bars));
                }
                extra_stocks.push(stock);
            }
        }

        self.db.append_stocks(&extra_stocks, &extra_charts).await
    }
}

/// Masters in deterministic (ticker) order for stable insert ordering
fn sorted_masters(masters: &MasterMap) -> Vec<crate::models::StockMasterRecord> {
    let mut list: Vec<_> = masters.values().cloned().collect();
    list.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    list
}
