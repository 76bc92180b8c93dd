//! Pipeline-wide constants
//!
//! The index set and scraping contract mirror the public holdings pages the
//! scraper reads: each page carries one `table.table` whose body rows have at
//! least 4 cells (rank, name, ticker, weight-with-percent-sign).

use crate::models::IndexSpec;

/// Base URL of the scraped holdings pages
pub const SLICK_CHARTS_URL: &str = "https://www.slickcharts.com";

/// The fixed set of tracked indices
pub const INDEX_SPECS: &[IndexSpec] = &[
    IndexSpec {
        name: "S&P 500 Index",
        slug: "sp500",
        path: "/sp500",
    },
    IndexSpec {
        name: "Nasdaq 100 Index",
        slug: "nasdaq100",
        path: "/nasdaq100",
    },
    IndexSpec {
        name: "Dow Jones",
        slug: "dowjones",
        path: "/dowjones",
    },
    IndexSpec {
        name: "Magnificent Seven",
        slug: "magnificent7",
        path: "/magnificent7",
    },
    IndexSpec {
        name: "Berkshire Hathaway Holdings",
        slug: "berkshire-hathaway",
        path: "/berkshire-hathaway",
    },
    IndexSpec {
        name: "Ark Innovation Index",
        slug: "ark-innovations",
        path: "/etf/ark-invest/ARKK",
    },
];

/// Index scopes that get their own top-movers rankings (besides the overall market)
pub const TOP_MOVER_INDEX_SLUGS: &[&str] = &["sp500", "nasdaq100", "dowjones"];

/// Number of stocks per top-movers list
pub const NUM_TOP_STOCKS: usize = 50;

/// Sentinel ticker recorded for holdings rows with an empty ticker cell.
/// Keeping the row preserves the index weight accounting.
pub const UNKNOWN_TICKER: &str = "N/A";

/// Fixed delay between holdings-page requests (politeness, not retried)
pub const SCRAPE_DELAY_SECS: u64 = 5;

/// Browser User-Agent sent to the scraped pages
pub const SCRAPE_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";

/// Per-request HTTP timeout
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Short and long simple-moving-average windows (trading days)
pub const DMA_SHORT_WINDOW: usize = 50;
pub const DMA_LONG_WINDOW: usize = 200;

/// Calendar-day lookback requested from the daily-aggregates endpoint.
/// 300 calendar days comfortably covers 200 trading days.
pub const CLOSE_LOOKBACK_DAYS: i64 = 300;

/// Calendar-day lookback for the 52-week high/low
pub const RANGE_LOOKBACK_DAYS: i64 = 365;

/// EMA windows fetched per timespan for chart series
pub const EMA_WINDOWS: [u32; 3] = [30, 50, 200];

/// Calendar-day lookbacks for the stored chart bars, per timespan
pub const MINUTE_BAR_LOOKBACK_DAYS: i64 = 5;
pub const HOUR_BAR_LOOKBACK_DAYS: i64 = 30;
pub const DAY_BAR_LOOKBACK_DAYS: i64 = 365;

/// Max results requested per aggregates / EMA call
pub const AGG_RESULT_LIMIT: u32 = 5000;
