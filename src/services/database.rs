//! SQLite storage for the refresh pipeline
//!
//! One pool per refresh cycle; the pipeline is the only writer, the web
//! layer only reads. The whole dataset is replaced through
//! [`Database::replace_all`]: deletes in FK-safe order followed by bulk
//! inserts of the staged records, all inside a single transaction so a
//! reader never observes a half-updated dataset.

use crate::error::{AppError, Result};
use crate::models::{
    ChartBar, ChartBarSet, IndexRecord, MoverCategory, ScopeMovers, ScrapedHolding,
    StockMasterRecord, StockRecord, Timespan,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Deletion order respecting foreign keys (children first)
const REPLACE_DELETE_ORDER: &[&str] = &[
    "index_holdings",
    "minute_bars",
    "hour_bars",
    "day_bars",
    "top_movers",
    "market_indices",
    "stocks",
    "stock_master",
];

/// Row counts written by one atomic replace
#[derive(Debug, Default, Clone)]
pub struct ReplaceStats {
    pub masters: usize,
    pub indices: usize,
    pub stocks: usize,
    pub holdings: usize,
    pub holdings_dropped: usize,
    pub bars: usize,
}

#[derive(Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database with the pipeline's connection
    /// settings and make sure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Io(format!("cannot create {}: {}", parent.display(), e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;
        let db = Self { pool };
        db.init_schema().await?;
        info!(path = %path.display(), "database ready");
        Ok(db)
    }

    /// Open from the configured path
    pub async fn open_default() -> Result<Self> {
        let path: PathBuf = crate::utils::get_database_path();
        Self::open(&path).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn init_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS stock_master (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                ticker_type TEXT,
                primary_exchange TEXT NOT NULL,
                snapshot_at DATETIME NOT NULL,
                day_open REAL NOT NULL,
                day_high REAL NOT NULL,
                day_low REAL NOT NULL,
                day_close REAL NOT NULL,
                volume INTEGER NOT NULL,
                todays_change REAL NOT NULL,
                todays_change_perc REAL NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS stocks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                snapshot_at DATETIME NOT NULL,
                day_open REAL NOT NULL,
                day_high REAL NOT NULL,
                day_low REAL NOT NULL,
                day_close REAL NOT NULL,
                volume INTEGER NOT NULL,
                todays_change REAL NOT NULL,
                todays_change_perc REAL NOT NULL,
                description TEXT,
                homepage_url TEXT,
                industry TEXT,
                employees INTEGER,
                market_cap REAL,
                icon_url TEXT,
                list_date DATE,
                dma_50 REAL,
                dma_200 REAL,
                dma_200_perc_diff REAL,
                low_52w REAL,
                high_52w REAL,
                related_companies TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS market_indices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                slug TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL,
                refreshed_at DATETIME NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS index_holdings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                index_id INTEGER NOT NULL REFERENCES market_indices(id),
                stock_id INTEGER NOT NULL REFERENCES stocks(id),
                rank INTEGER,
                weight REAL,
                UNIQUE(index_id, stock_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS minute_bars (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stock_id INTEGER NOT NULL REFERENCES stocks(id),
                ts DATETIME NOT NULL,
                close REAL NOT NULL,
                ema_30 REAL,
                ema_50 REAL,
                ema_200 REAL,
                volume INTEGER NOT NULL,
                UNIQUE(stock_id, ts)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS hour_bars (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stock_id INTEGER NOT NULL REFERENCES stocks(id),
                ts DATETIME NOT NULL,
                close REAL NOT NULL,
                ema_30 REAL,
                ema_50 REAL,
                ema_200 REAL,
                volume INTEGER NOT NULL,
                UNIQUE(stock_id, ts)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS day_bars (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stock_id INTEGER NOT NULL REFERENCES stocks(id),
                ts DATETIME NOT NULL,
                close REAL NOT NULL,
                ema_30 REAL,
                ema_50 REAL,
                ema_200 REAL,
                volume INTEGER NOT NULL,
                UNIQUE(stock_id, ts)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS top_movers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scope_slug TEXT NOT NULL,
                scope_name TEXT NOT NULL,
                category TEXT NOT NULL,
                rank INTEGER NOT NULL,
                ticker TEXT NOT NULL,
                name TEXT NOT NULL,
                day_close REAL NOT NULL,
                todays_change REAL NOT NULL,
                todays_change_perc REAL NOT NULL,
                volume INTEGER NOT NULL,
                UNIQUE(scope_slug, category, rank)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_master_change_perc ON stock_master(todays_change_perc)",
            "CREATE INDEX IF NOT EXISTS idx_master_volume ON stock_master(volume)",
            "CREATE INDEX IF NOT EXISTS idx_holdings_index ON index_holdings(index_id, weight DESC)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Replace the full dataset in one transaction. Staged holdings whose
    /// ticker has no staged stock row (including the unknown-ticker
    /// sentinel) are dropped with a warning; duplicate tickers within one
    /// index are suppressed, first occurrence wins. Any error rolls the
    /// whole replacement back.
    pub async fn replace_all(
        &self,
        masters: &[StockMasterRecord],
        indices: &[(IndexRecord, Vec<ScrapedHolding>)],
        stocks: &[StockRecord],
        charts: &[(String, ChartBarSet)],
    ) -> Result<ReplaceStats> {
        let mut tx = self.pool.begin().await?;
        let mut stats = ReplaceStats::default();

        for table in REPLACE_DELETE_ORDER {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        for master in masters {
            insert_master(&mut tx, master).await?;
            stats.masters += 1;
        }

        let mut stock_ids: HashMap<String, i64> = HashMap::new();
        for stock in stocks {
            let id = insert_stock(&mut tx, stock).await?;
            stock_ids.insert(stock.ticker.clone(), id);
            stats.stocks += 1;
        }

        for (record, holdings) in indices {
            let index_id = insert_index(&mut tx, record).await?;
            stats.indices += 1;

            let mut seen_in_index: HashSet<&str> = HashSet::new();
            for holding in holdings {
                let stock_id = match stock_ids.get(holding.ticker.as_str()) {
                    Some(&id) => id,
                    None => {
                        warn!(
                            index = %record.slug,
                            ticker = %holding.ticker,
                            "holding has no stock row, dropped"
                        );
                        stats.holdings_dropped += 1;
                        continue;
                    }
                };
                if !seen_in_index.insert(holding.ticker.as_str()) {
                    warn!(
                        index = %record.slug,
                        ticker = %holding.ticker,
                        "duplicate ticker in index, suppressed"
                    );
                    stats.holdings_dropped += 1;
                    continue;
                }
                sqlx::query(
                    "INSERT INTO index_holdings (index_id, stock_id, rank, weight)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(index_id)
                .bind(stock_id)
                .bind(holding.rank.map(|r| r as i64))
                .bind(holding.weight)
                .execute(&mut *tx)
                .await?;
                stats.holdings += 1;
            }
        }

        for (ticker, bar_set) in charts {
            if let Some(&stock_id) = stock_ids.get(ticker.as_str()) {
                stats.bars += insert_bar_set(&mut tx, stock_id, bar_set).await?;
            }
        }

        tx.commit().await?;
        info!(
            masters = stats.masters,
            indices = stats.indices,
            stocks = stats.stocks,
            holdings = stats.holdings,
            holdings_dropped = stats.holdings_dropped,
            bars = stats.bars,
            "atomic replace committed"
        );
        Ok(stats)
    }

    /// Follow-up append for top-movers tickers that were missing a stock
    /// row after the main commit. One transaction for the batch.
    pub async fn append_stocks(
        &self,
        stocks: &[StockRecord],
        charts: &[(String, ChartBarSet)],
    ) -> Result<usize> {
        if stocks.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut stock_ids: HashMap<String, i64> = HashMap::new();

        for stock in stocks {
            let id = insert_stock(&mut tx, stock).await?;
            stock_ids.insert(stock.ticker.clone(), id);
        }
        for (ticker, bar_set) in charts {
            if let Some(&stock_id) = stock_ids.get(ticker.as_str()) {
                insert_bar_set(&mut tx, stock_id, bar_set).await?;
            }
        }
        tx.commit().await?;
        Ok(stocks.len())
    }

    /// Replace the persisted top-movers rankings
    pub async fn replace_top_movers(&self, movers: &[ScopeMovers]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM top_movers").execute(&mut *tx).await?;

        let mut inserted = 0usize;
        for scope in movers {
            for category in MoverCategory::all() {
                for (position, row) in scope.rows(category).iter().enumerate() {
                    sqlx::query(
                        "INSERT INTO top_movers
                         (scope_slug, scope_name, category, rank, ticker, name,
                          day_close, todays_change, todays_change_perc, volume)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    )
                    .bind(&scope.slug)
                    .bind(&scope.name)
                    .bind(category.as_str())
                    .bind(position as i64 + 1)
                    .bind(&row.ticker)
                    .bind(&row.name)
                    .bind(row.day_close)
                    .bind(row.todays_change)
                    .bind(row.todays_change_perc)
                    .bind(row.volume as i64)
                    .execute(&mut *tx)
                    .await?;
                    inserted += 1;
                }
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Tickers ranked in top_movers that have no stocks row yet
    pub async fn movers_without_stock_rows(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT tm.ticker FROM top_movers tm
             LEFT JOIN stocks s ON s.ticker = tm.ticker
             WHERE s.id IS NULL
             ORDER BY tm.ticker",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("ticker").map_err(AppError::from))
            .collect()
    }

    /// Row counts for every pipeline-owned table
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        let mut counts = Vec::new();
        for table in REPLACE_DELETE_ORDER {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await?;
            counts.push((*table, count));
        }
        Ok(counts)
    }
}

async fn insert_master(
    tx: &mut Transaction<'_, Sqlite>,
    master: &StockMasterRecord,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO stock_master
         (ticker, name, ticker_type, primary_exchange, snapshot_at,
          day_open, day_high, day_low, day_close, volume,
          todays_change, todays_change_perc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )
    .bind(&master.ticker)
    .bind(&master.name)
    .bind(&master.ticker_type)
    .bind(&master.primary_exchange)
    .bind(master.snapshot_at)
    .bind(master.day_open)
    .bind(master.day_high)
    .bind(master.day_low)
    .bind(master.day_close)
    .bind(master.volume as i64)
    .bind(master.todays_change)
    .bind(master.todays_change_perc)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_stock(tx: &mut Transaction<'_, Sqlite>, stock: &StockRecord) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO stocks
         (ticker, name, snapshot_at, day_open, day_high, day_low, day_close,
          volume, todays_change, todays_change_perc, description, homepage_url,
          industry, employees, market_cap, icon_url, list_date, dma_50, dma_200,
          dma_200_perc_diff, low_52w, high_52w, related_companies)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                 ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
    )
    .bind(&stock.ticker)
    .bind(&stock.name)
    .bind(stock.snapshot_at)
    .bind(stock.day_open)
    .bind(stock.day_high)
    .bind(stock.day_low)
    .bind(stock.day_close)
    .bind(stock.volume as i64)
    .bind(stock.todays_change)
    .bind(stock.todays_change_perc)
    .bind(&stock.description)
    .bind(&stock.homepage_url)
    .bind(&stock.industry)
    .bind(stock.employees.map(|e| e as i64))
    .bind(stock.market_cap)
    .bind(&stock.icon_url)
    .bind(stock.list_date)
    .bind(stock.dma_50)
    .bind(stock.dma_200)
    .bind(stock.dma_200_perc_diff)
    .bind(stock.low_52w)
    .bind(stock.high_52w)
    .bind(&stock.related_companies)
    .execute(&mut **tx)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn insert_index(tx: &mut Transaction<'_, Sqlite>, record: &IndexRecord) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO market_indices (name, slug, url, refreshed_at)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&record.name)
    .bind(&record.slug)
    .bind(&record.url)
    .bind(record.refreshed_at)
    .execute(&mut **tx)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn insert_bar_set(
    tx: &mut Transaction<'_, Sqlite>,
    stock_id: i64,
    bar_set: &ChartBarSet,
) -> Result<usize> {
    let mut inserted = 0usize;
    for timespan in Timespan::all() {
        for bar in bar_set.bars(timespan) {
            insert_bar(tx, timespan, stock_id, bar).await?;
            inserted += 1;
        }
    }
    Ok(inserted)
}

async fn insert_bar(
    tx: &mut Transaction<'_, Sqlite>,
    timespan: Timespan,
    stock_id: i64,
    bar: &ChartBar,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (stock_id, ts, close, ema_30, ema_50, ema_200, volume)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        timespan.table_name()
    );
    sqlx::query(&sql)
        .bind(stock_id)
        .bind(bar.ts)
        .bind(bar.close)
        .bind(bar.ema_30)
        .bind(bar.ema_50)
        .bind(bar.ema_200)
        .bind(bar.volume as i64)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Map a stock_master row (shared by the queries module and tests)
pub fn master_from_row(row: &SqliteRow) -> Result<StockMasterRecord> {
    Ok(StockMasterRecord {
        ticker: row.try_get("ticker")?,
        name: row.try_get("name")?,
        ticker_type: row.try_get("ticker_type")?,
        primary_exchange: row.try_get("primary_exchange")?,
        snapshot_at: row.try_get("snapshot_at")?,
        day_open: row.try_get("day_open")?,
        day_high: row.try_get("day_high")?,
        day_low: row.try_get("day_low")?,
        day_close: row.try_get("day_close")?,
        volume: row.try_get::<i64, _>("volume")? as u64,
        todays_change: row.try_get("todays_change")?,
        todays_change_perc: row.try_get("todays_change_perc")?,
    })
}

/// Map a stocks row
pub fn stock_from_row(row: &SqliteRow) -> Result<StockRecord> {
    Ok(StockRecord {
        ticker: row.try_get("ticker")?,
        name: row.try_get("name")?,
        snapshot_at: row.try_get("snapshot_at")?,
        day_open: row.try_get("day_open")?,
        day_high: row.try_get("day_high")?,
        day_low: row.try_get("day_low")?,
        day_close: row.try_get("day_close")?,
        volume: row.try_get::<i64, _>("volume")? as u64,
        todays_change: row.try_get("todays_change")?,
        todays_change_perc: row.try_get("todays_change_perc")?,
        description: row.try_get("description")?,
        homepage_url: row.try_get("homepage_url")?,
        industry: row.try_get("industry")?,
        employees: row.try_get::<Option<i64>, _>("employees")?.map(|e| e as u64),
        market_cap: row.try_get("market_cap")?,
        icon_url: row.try_get("icon_url")?,
        list_date: row.try_get("list_date")?,
        dma_50: row.try_get("dma_50")?,
        dma_200: row.try_get("dma_200")?,
        dma_200_perc_diff: row.try_get("dma_200_perc_diff")?,
        low_52w: row.try_get("low_52w")?,
        high_52w: row.try_get("high_52w")?,
        related_companies: row.try_get("related_companies")?,
    })
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use chrono::{TimeZone, Utc};

    pub fn master(ticker: &str, change: f64, change_perc: f64, volume: u64) -> StockMasterRecord {
        StockMasterRecord {
            ticker: ticker.to_string(),
            name: format!("{} Inc.", ticker),
            ticker_type: Some("Common Stock".to_string()),
            primary_exchange: "XNAS".to_string(),
            snapshot_at: Utc.timestamp_opt(1_750_464_000, 0).unwrap(),
            day_open: 100.0,
            day_high: 105.0,
            day_low: 95.0,
            day_close: 100.0 + change,
            volume,
            todays_change: change,
            todays_change_perc: change_perc,
        }
    }

    pub fn stock(ticker: &str, change: f64, change_perc: f64, volume: u64) -> StockRecord {
        StockRecord::from_master(&master(ticker, change, change_perc, volume))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{master, stock};
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn index(slug: &str) -> IndexRecord {
        IndexRecord {
            name: format!("{} Index", slug),
            slug: slug.to_string(),
            url: format!("https://www.slickcharts.com/{}", slug),
            refreshed_at: Utc.timestamp_opt(1_750_464_000, 0).unwrap(),
        }
    }

    fn holding(ticker: &str, rank: u32, weight: f64) -> ScrapedHolding {
        ScrapedHolding {
            rank: Some(rank),
            ticker: ticker.to_string(),
            weight: Some(weight),
        }
    }

    async fn counts_map(db: &Database) -> HashMap<&'static str, i64> {
        db.table_counts().await.unwrap().into_iter().collect()
    }

    #[tokio::test]
    async fn test_replace_all_inserts_staged_rows() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).await.unwrap();

        let masters = vec![master("AAPL", 2.0, 1.0, 100), master("MSFT", -1.0, -0.5, 200)];
        let stocks = vec![stock("AAPL", 2.0, 1.0, 100)];
        let indices = vec![(index("sp500"), vec![holding("AAPL", 1, 7.25)])];

        let stats = db.replace_all(&masters, &indices, &stocks, &[]).await.unwrap();
        assert_eq!(stats.masters, 2);
        assert_eq!(stats.stocks, 1);
        assert_eq!(stats.holdings, 1);

        let counts = counts_map(&db).await;
        assert_eq!(counts["stock_master"], 2);
        assert_eq!(counts["stocks"], 1);
        assert_eq!(counts["index_holdings"], 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_replace_all_is_idempotent() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).await.unwrap();

        let masters = vec![master("AAPL", 2.0, 1.0, 100)];
        let stocks = vec![stock("AAPL", 2.0, 1.0, 100)];
        let indices = vec![(index("sp500"), vec![holding("AAPL", 1, 7.25)])];

        db.replace_all(&masters, &indices, &stocks, &[]).await.unwrap();
        let first = counts_map(&db).await;
        db.replace_all(&masters, &indices, &stocks, &[]).await.unwrap();
        let second = counts_map(&db).await;

        assert_eq!(first, second);
        db.close().await;
    }

    #[tokio::test]
    async fn test_replace_all_drops_unresolvable_and_duplicate_holdings() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).await.unwrap();

        let masters = vec![master("AAPL", 2.0, 1.0, 100)];
        let stocks = vec![stock("AAPL", 2.0, 1.0, 100)];
        let indices = vec![(
            index("sp500"),
            vec![
                holding("AAPL", 1, 7.25),
                holding("N/A", 2, 0.5),
                holding("AAPL", 3, 7.25),
            ],
        )];

        let stats = db.replace_all(&masters, &indices, &stocks, &[]).await.unwrap();
        assert_eq!(stats.holdings, 1);
        assert_eq!(stats.holdings_dropped, 2);
        db.close().await;
    }

    #[tokio::test]
    async fn test_failed_replace_rolls_back_everything() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).await.unwrap();

        let masters = vec![master("AAPL", 2.0, 1.0, 100)];
        let stocks = vec![stock("AAPL", 2.0, 1.0, 100)];
        let indices = vec![(index("sp500"), vec![holding("AAPL", 1, 7.25)])];
        db.replace_all(&masters, &indices, &stocks, &[]).await.unwrap();
        let before = counts_map(&db).await;

        // Duplicate ticker violates the stocks UNIQUE constraint mid-insert
        let bad_stocks = vec![stock("AAPL", 2.0, 1.0, 100), stock("AAPL", 2.0, 1.0, 100)];
        let result = db
            .replace_all(&masters, &indices, &bad_stocks, &[])
            .await;
        assert!(result.is_err());

        let after = counts_map(&db).await;
        assert_eq!(before, after);
        db.close().await;
    }

    #[tokio::test]
    async fn test_bar_inserts_land_in_their_tables() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).await.unwrap();

        let bar = ChartBar {
            ts: Utc.timestamp_opt(1_750_464_000, 0).unwrap(),
            close: 212.3,
            ema_30: Some(211.0),
            ema_50: None,
            ema_200: None,
            volume: 1000,
        };
        let charts = vec![(
            "AAPL".to_string(),
            ChartBarSet {
                minute: vec![bar.clone()],
                hour: vec![bar.clone()],
                day: vec![bar],
            },
        )];

        let stats = db
            .replace_all(
                &[master("AAPL", 2.0, 1.0, 100)],
                &[],
                &[stock("AAPL", 2.0, 1.0, 100)],
                &charts,
            )
            .await
            .unwrap();
        assert_eq!(stats.bars, 3);

        let counts = counts_map(&db).await;
        assert_eq!(counts["minute_bars"], 1);
        assert_eq!(counts["hour_bars"], 1);
        assert_eq!(counts["day_bars"], 1);
        db.close().await;
    }
}
