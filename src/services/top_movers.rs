//! Top-Movers Aggregator
//!
//! Reads the freshly committed tables and derives ranked gainers, losers,
//! and most-traded lists for the overall market (from `stock_master`) and
//! for a fixed subset of indices (from `stocks` joined through the
//! holdings). Classification uses the raw change, not the percent: a
//! zero-change ticker lands in neither gainers nor losers. Ties are broken
//! by ticker ascending so rankings are deterministic.

use crate::constants::{NUM_TOP_STOCKS, TOP_MOVER_INDEX_SLUGS};
use crate::error::{AppError, Result};
use crate::models::{MoverCategory, MoverRow, ScopeMovers};
use crate::services::database::Database;
use sqlx::Row;
use tracing::{info, warn};

/// Compute rankings for the overall market and each configured index scope
pub async fn compute(db: &Database) -> Result<Vec<ScopeMovers>> {
    let mut scopes = Vec::new();
    scopes.push(overall_movers(db).await?);

    for slug in TOP_MOVER_INDEX_SLUGS {
        match index_movers(db, slug).await {
            Ok(Some(scope)) => scopes.push(scope),
            Ok(None) => warn!(slug, "index not present this cycle, no rankings"),
            Err(e) => return Err(e),
        }
    }

    info!(scopes = scopes.len(), "top movers computed");
    Ok(scopes)
}

async fn overall_movers(db: &Database) -> Result<ScopeMovers> {
    let base = "SELECT ticker, name, day_close, todays_change, todays_change_perc, volume
                FROM stock_master";
    Ok(ScopeMovers {
        slug: "overall".to_string(),
        name: "Overall Market".to_string(),
        gainers: fetch_category(db, base, MoverCategory::Gainers, &[]).await?,
        losers: fetch_category(db, base, MoverCategory::Losers, &[]).await?,
        most_traded: fetch_category(db, base, MoverCategory::MostTraded, &[]).await?,
    })
}

async fn index_movers(db: &Database, slug: &str) -> Result<Option<ScopeMovers>> {
    let index_row = sqlx::query("SELECT id, name FROM market_indices WHERE slug = ?1")
        .bind(slug)
        .fetch_optional(db.pool())
        .await?;
    let Some(index_row) = index_row else {
        return Ok(None);
    };
    let index_id: i64 = index_row.try_get("id")?;
    let name: String = index_row.try_get("name")?;

    let base = "SELECT s.ticker, s.name, s.day_close, s.todays_change,
                       s.todays_change_perc, s.volume
                FROM index_holdings ih
                JOIN stocks s ON s.id = ih.stock_id
                WHERE ih.index_id = ?1";
    let bind = [index_id];

    Ok(Some(ScopeMovers {
        slug: slug.to_string(),
        name,
        gainers: fetch_category(db, base, MoverCategory::Gainers, &bind).await?,
        losers: fetch_category(db, base, MoverCategory::Losers, &bind).await?,
        most_traded: fetch_category(db, base, MoverCategory::MostTraded, &bind).await?,
    }))
}

async fn fetch_category(
    db: &Database,
    base: &str,
    category: MoverCategory,
    bind: &[i64],
) -> Result<Vec<MoverRow>> {
    let connector = if base.contains("WHERE") { "AND" } else { "WHERE" };
    let clause = match category {
        MoverCategory::Gainers => format!(
            "{} todays_change > 0 ORDER BY todays_change_perc DESC, ticker ASC",
            connector
        ),
        MoverCategory::Losers => format!(
            "{} todays_change < 0 ORDER BY todays_change_perc ASC, ticker ASC",
            connector
        ),
        MoverCategory::MostTraded => "ORDER BY volume DESC, ticker ASC".to_string(),
    };
    let sql = format!("{} {} LIMIT {}", base, clause, NUM_TOP_STOCKS);

    let mut query = sqlx::query(&sql);
    for value in bind {
        query = query.bind(value);
    }

    let rows = query.fetch_all(db.pool()).await?;
    rows.iter()
        .map(|row| {
            Ok(MoverRow {
                ticker: row.try_get("ticker")?,
                name: row.try_get("name")?,
                day_close: row.try_get("day_close")?,
                todays_change: row.try_get("todays_change")?,
                todays_change_perc: row.try_get("todays_change_perc")?,
                volume: row.try_get::<i64, _>("volume")? as u64,
            })
        })
        .collect::<std::result::Result<Vec<_>, AppError>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndexRecord, ScrapedHolding};
    use crate::services::database::test_support::{master, stock};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    async fn seeded_db(dir: &std::path::Path) -> Database {
        let db = Database::open(&dir.join("test.db")).await.unwrap();

        let masters = vec![
            master("UPPP", 5.0, 4.2, 900),
            master("DOWN", -3.0, -2.8, 800),
            master("FLAT", 0.0, 0.0, 9_000),
            master("BUSY", 1.0, 0.9, 50_000),
        ];
        let stocks = vec![
            stock("UPPP", 5.0, 4.2, 900),
            stock("DOWN", -3.0, -2.8, 800),
        ];
        let indices = vec![(
            IndexRecord {
                name: "S&P 500 Index".to_string(),
                slug: "sp500".to_string(),
                url: "https://www.slickcharts.com/sp500".to_string(),
                refreshed_at: Utc.timestamp_opt(1_750_464_000, 0).unwrap(),
            },
            vec![
                ScrapedHolding { rank: Some(1), ticker: "UPPP".to_string(), weight: Some(7.0) },
                ScrapedHolding { rank: Some(2), ticker: "DOWN".to_string(), weight: Some(3.0) },
            ],
        )];

        db.replace_all(&masters, &indices, &stocks, &[]).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_zero_change_appears_in_neither_list() {
        let dir = tempdir().unwrap();
        let db = seeded_db(dir.path()).await;

        let scopes = compute(&db).await.unwrap();
        let overall = &scopes[0];

        let gainer_tickers: Vec<&str> =
            overall.gainers.iter().map(|r| r.ticker.as_str()).collect();
        let loser_tickers: Vec<&str> =
            overall.losers.iter().map(|r| r.ticker.as_str()).collect();

        assert!(gainer_tickers.contains(&"UPPP"));
        assert!(!gainer_tickers.contains(&"FLAT"));
        assert!(loser_tickers.contains(&"DOWN"));
        assert!(!loser_tickers.contains(&"FLAT"));
        db.close().await;
    }

    #[tokio::test]
    async fn test_most_traded_sorted_by_volume() {
        let dir = tempdir().unwrap();
        let db = seeded_db(dir.path()).await;

        let scopes = compute(&db).await.unwrap();
        let most_traded = &scopes[0].most_traded;
        assert_eq!(most_traded[0].ticker, "BUSY");
        assert_eq!(most_traded[1].ticker, "FLAT");
        db.close().await;
    }

    #[tokio::test]
    async fn test_index_scope_uses_holdings_join() {
        let dir = tempdir().unwrap();
        let db = seeded_db(dir.path()).await;

        let scopes = compute(&db).await.unwrap();
        let sp500 = scopes.iter().find(|s| s.slug == "sp500").unwrap();
        assert_eq!(sp500.name, "S&P 500 Index");
        assert_eq!(sp500.gainers.len(), 1);
        assert_eq!(sp500.gainers[0].ticker, "UPPP");
        assert_eq!(sp500.losers[0].ticker, "DOWN");
        // BUSY and FLAT are not constituents: absent from the index scope
        assert_eq!(sp500.most_traded.len(), 2);
        db.close().await;
    }

    #[tokio::test]
    async fn test_missing_index_yields_no_scope() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("empty.db")).await.unwrap();
        db.replace_all(&[], &[], &[], &[]).await.unwrap();

        let scopes = compute(&db).await.unwrap();
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0].slug, "overall");
        db.close().await;
    }
}
