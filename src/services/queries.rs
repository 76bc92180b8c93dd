//! Read-side data contract
//!
//! The query surface the external web layer calls into. The pipeline owns
//! every write; these functions only read. Policies fixed here:
//! holdings with a NULL percent-deviation are always included in index
//! views, an unknown ticker is a `NotFound` error (no live fetch
//! mid-request), and chart windows are bounded by the freshness marker's
//! last trading date.

use crate::error::{AppError, Result};
use crate::models::{ChartBar, ChartRange, StockMasterRecord, StockRecord};
use crate::services::database::{master_from_row, stock_from_row, Database};
use crate::services::freshness;
use crate::utils::{eastern_date, eastern_day_start};
use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use std::path::Path;

/// One row of the index listing
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub url: String,
    pub refreshed_at: DateTime<Utc>,
}

/// One constituent row in an index view
#[derive(Debug, Clone)]
pub struct HoldingView {
    pub rank: Option<i64>,
    pub weight: Option<f64>,
    pub ticker: String,
    pub name: String,
    pub day_close: f64,
    pub todays_change: f64,
    pub todays_change_perc: f64,
    pub dma_200: Option<f64>,
    pub dma_200_perc_diff: Option<f64>,
    pub low_52w: Option<f64>,
    pub high_52w: Option<f64>,
}

/// An index and its constituents, weight-descending
#[derive(Debug, Clone)]
pub struct IndexView {
    pub index: IndexSummary,
    pub holdings: Vec<HoldingView>,
}

/// A stock as served to the reader: the master snapshot always, the rich
/// record when one exists
#[derive(Debug, Clone)]
pub struct StockView {
    pub master: StockMasterRecord,
    pub detail: Option<StockRecord>,
    pub related: Vec<String>,
}

/// All tracked indices, alphabetical by name
pub async fn all_indices(db: &Database) -> Result<Vec<IndexSummary>> {
    let rows = sqlx::query(
        "SELECT id, name, slug, url, refreshed_at FROM market_indices ORDER BY name ASC",
    )
    .fetch_all(db.pool())
    .await?;
    rows.iter().map(index_summary_from_row).collect()
}

/// One index with its holdings ordered by weight descending (NULL weights
/// last, then ticker). Stocks with a NULL percent-deviation are included.
pub async fn index_with_holdings(db: &Database, slug: &str) -> Result<IndexView> {
    let row = sqlx::query("SELECT id, name, slug, url, refreshed_at FROM market_indices WHERE slug = ?1")
        .bind(slug)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("index '{}'", slug)))?;
    let index = index_summary_from_row(&row)?;

    let rows = sqlx::query(
        "SELECT ih.rank, ih.weight, s.ticker, s.name, s.day_close,
                s.todays_change, s.todays_change_perc, s.dma_200,
                s.dma_200_perc_diff, s.low_52w, s.high_52w
         FROM index_holdings ih
         JOIN stocks s ON s.id = ih.stock_id
         WHERE ih.index_id = ?1
         ORDER BY ih.weight IS NULL, ih.weight DESC, s.ticker ASC",
    )
    .bind(index.id)
    .fetch_all(db.pool())
    .await?;

    let holdings = rows
        .iter()
        .map(|row| {
            Ok(HoldingView {
                rank: row.try_get("rank")?,
                weight: row.try_get("weight")?,
                ticker: row.try_get("ticker")?,
                name: row.try_get("name")?,
                day_close: row.try_get("day_close")?,
                todays_change: row.try_get("todays_change")?,
                todays_change_perc: row.try_get("todays_change_perc")?,
                dma_200: row.try_get("dma_200")?,
                dma_200_perc_diff: row.try_get("dma_200_perc_diff")?,
                low_52w: row.try_get("low_52w")?,
                high_52w: row.try_get("high_52w")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(IndexView { index, holdings })
}

/// Look up one stock. A ticker absent from the master table is a
/// `NotFound`; a master ticker without a rich record yields the
/// master-only view.
pub async fn find_stock(db: &Database, ticker: &str) -> Result<StockView> {
    let master_row = sqlx::query("SELECT * FROM stock_master WHERE ticker = ?1")
        .bind(ticker)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("stock '{}'", ticker)))?;
    let master = master_from_row(&master_row)?;

    let detail = sqlx::query("SELECT * FROM stocks WHERE ticker = ?1")
        .bind(ticker)
        .fetch_optional(db.pool())
        .await?
        .map(|row| stock_from_row(&row))
        .transpose()?;

    let related = detail
        .as_ref()
        .map(StockRecord::related_tickers)
        .unwrap_or_default();

    Ok(StockView {
        master,
        detail,
        related,
    })
}

/// Chart bars for one display range, oldest-first, bounded by the last
/// known trading day from the freshness marker.
pub async fn chart_bars(
    db: &Database,
    data_dir: &Path,
    ticker: &str,
    range: ChartRange,
) -> Result<Vec<ChartBar>> {
    let stock_id: i64 = sqlx::query_scalar("SELECT id FROM stocks WHERE ticker = ?1")
        .bind(ticker)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("stock '{}'", ticker)))?;

    // Without a marker (no refresh has succeeded yet) fall back to today
    let last_trading_day = freshness::read_refresh_marker(data_dir)
        .map(|marker| marker.last_updated_date)
        .unwrap_or_else(|| eastern_date(Utc::now()));

    let window_start = range.window_start(last_trading_day);
    let from = eastern_day_start(window_start)
        .ok_or_else(|| AppError::InvalidInput(format!("bad window start {}", window_start)))?;
    // 1D means exactly the last trading day, not everything since midnight
    let to = match range {
        ChartRange::D1 => eastern_day_start(last_trading_day + Duration::days(1)),
        _ => None,
    };

    let timespan = range.timespan();
    let sql = match to {
        Some(_) => format!(
            "SELECT ts, close, ema_30, ema_50, ema_200, volume FROM {}
             WHERE stock_id = ?1 AND ts >= ?2 AND ts < ?3 ORDER BY ts ASC",
            timespan.table_name()
        ),
        None => format!(
            "SELECT ts, close, ema_30, ema_50, ema_200, volume FROM {}
             WHERE stock_id = ?1 AND ts >= ?2 ORDER BY ts ASC",
            timespan.table_name()
        ),
    };

    let mut query = sqlx::query(&sql).bind(stock_id).bind(from);
    if let Some(to) = to {
        query = query.bind(to);
    }
    let rows = query.fetch_all(db.pool()).await?;

    rows.iter()
        .map(|row| {
            Ok(ChartBar {
                ts: row.try_get("ts")?,
                close: row.try_get("close")?,
                ema_30: row.try_get("ema_30")?,
                ema_50: row.try_get("ema_50")?,
                ema_200: row.try_get("ema_200")?,
                volume: row.try_get::<i64, _>("volume")? as u64,
            })
        })
        .collect()
}

/// Percent change across a bar series (first vs last close)
pub fn series_change_perc(bars: &[ChartBar]) -> Option<f64> {
    let first = bars.first()?;
    let last = bars.last()?;
    if bars.len() < 2 || first.close == 0.0 {
        return None;
    }
    Some(crate::models::indicators::round2(
        (last.close - first.close) * 100.0 / first.close,
    ))
}

fn index_summary_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<IndexSummary> {
    Ok(IndexSummary {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        url: row.try_get("url")?,
        refreshed_at: row.try_get("refreshed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartBarSet, IndexRecord, ScrapedHolding};
    use crate::services::database::test_support::{master, stock};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn sp500() -> IndexRecord {
        IndexRecord {
            name: "S&P 500 Index".to_string(),
            slug: "sp500".to_string(),
            url: "https://www.slickcharts.com/sp500".to_string(),
            refreshed_at: Utc.timestamp_opt(1_750_464_000, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_not_found() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).await.unwrap();
        db.replace_all(&[], &[], &[], &[]).await.unwrap();

        let result = find_stock(&db, "NOPE").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        db.close().await;
    }

    #[tokio::test]
    async fn test_master_without_detail_yields_master_only_view() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).await.unwrap();
        db.replace_all(&[master("AAPL", 2.0, 1.0, 100)], &[], &[], &[])
            .await
            .unwrap();

        let view = find_stock(&db, "AAPL").await.unwrap();
        assert_eq!(view.master.ticker, "AAPL");
        assert!(view.detail.is_none());
        assert!(view.related.is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_null_deviation_holdings_are_included() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).await.unwrap();

        // stock() leaves dma_200_perc_diff NULL
        let stocks = vec![stock("AAPL", 2.0, 1.0, 100)];
        let indices = vec![(
            sp500(),
            vec![ScrapedHolding {
                rank: Some(1),
                ticker: "AAPL".to_string(),
                weight: Some(7.25),
            }],
        )];
        db.replace_all(&[master("AAPL", 2.0, 1.0, 100)], &indices, &stocks, &[])
            .await
            .unwrap();

        let view = index_with_holdings(&db, "sp500").await.unwrap();
        assert_eq!(view.holdings.len(), 1);
        assert!(view.holdings[0].dma_200_perc_diff.is_none());

        let missing = index_with_holdings(&db, "nasdaq100").await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
        db.close().await;
    }

    #[tokio::test]
    async fn test_chart_window_filters_by_range() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).await.unwrap();

        let marker_instant = Utc.timestamp_opt(1_750_464_000, 0).unwrap();
        let marker = freshness::write_refresh_marker(dir.path(), marker_instant).unwrap();

        let recent = eastern_day_start(marker.last_updated_date).unwrap();
        let old = recent - Duration::days(400);
        let bars = ChartBarSet {
            minute: vec![],
            hour: vec![],
            day: vec![
                ChartBar { ts: old, close: 90.0, ema_30: None, ema_50: None, ema_200: None, volume: 1 },
                ChartBar { ts: recent, close: 110.0, ema_30: None, ema_50: None, ema_200: None, volume: 2 },
            ],
        };
        db.replace_all(
            &[master("AAPL", 2.0, 1.0, 100)],
            &[],
            &[stock("AAPL", 2.0, 1.0, 100)],
            &[("AAPL".to_string(), bars)],
        )
        .await
        .unwrap();

        let year = chart_bars(&db, dir.path(), "AAPL", ChartRange::Y1).await.unwrap();
        assert_eq!(year.len(), 1);
        assert_eq!(year[0].close, 110.0);
        db.close().await;
    }

    #[test]
    fn test_series_change_perc() {
        let bar = |close: f64| ChartBar {
            ts: Utc.timestamp_opt(1_750_464_000, 0).unwrap(),
            close,
            ema_30: None,
            ema_50: None,
            ema_200: None,
            volume: 0,
        };
        assert_eq!(series_change_perc(&[bar(100.0), bar(110.0)]), Some(10.0));
        assert_eq!(series_change_perc(&[bar(100.0)]), None);
        assert_eq!(series_change_perc(&[]), None);
    }
}
