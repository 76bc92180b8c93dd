//! Index Constituent Scraper
//!
//! Pulls the public holdings page for each tracked index and extracts
//! (rank, ticker, weight) rows from its `table.table`. Row contract: at
//! least 4 cells, cell 0 rank, cell 2 ticker, cell 3 weight with a percent
//! sign. Network and parse failures both degrade to an empty holdings list
//! for that index so the rest of the refresh is unaffected.

use crate::constants::{SCRAPE_DELAY_SECS, SCRAPE_USER_AGENT, UNKNOWN_TICKER};
use crate::error::{AppError, Result};
use crate::models::ScrapedHolding;
use scraper::{Html, Selector};
use std::time::Duration as StdDuration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Minimum cells for a table row to count as a holding
const MIN_HOLDING_CELLS: usize = 4;

pub struct IndexScraper {
    client: reqwest::Client,
    delay: StdDuration,
}

impl IndexScraper {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(SCRAPE_USER_AGENT)
            .timeout(StdDuration::from_secs(crate::constants::HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            delay: StdDuration::from_secs(SCRAPE_DELAY_SECS),
        })
    }

    /// Fetch and parse one index's holdings page. Degrades to an empty list
    /// on any failure; always honors the politeness delay afterwards.
    pub async fn fetch_holdings(&self, url: &str) -> Vec<ScrapedHolding> {
        info!(url, "scraping index holdings");
        let holdings = match self.fetch_page(url).await {
            Ok(body) => match parse_holdings(&body) {
                Ok(holdings) => holdings,
                Err(e) => {
                    warn!(url, error = %e, "holdings page did not parse, skipping index");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(url, error = %e, "holdings page fetch failed, skipping index");
                Vec::new()
            }
        };

        sleep(self.delay).await;
        holdings
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Network(format!(
                "holdings page returned {} for {}",
                status, url
            )));
        }
        Ok(response.text().await?)
    }
}

/// Extract holdings rows from a fetched page. Errors only when no holdings
/// table exists at all; malformed rows are skipped individually.
pub fn parse_holdings(html: &str) -> Result<Vec<ScrapedHolding>> {
    // Static selectors, known-valid
    let table_selector = Selector::parse("table.table tbody tr").unwrap();
    let cell_selector = Selector::parse("td").unwrap();

    let document = Html::parse_document(html);
    let mut holdings = Vec::new();
    let mut saw_row = false;

    for row in document.select(&table_selector) {
        saw_row = true;
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();

        if cells.len() < MIN_HOLDING_CELLS {
            continue;
        }

        let ticker = if cells[2].is_empty() {
            UNKNOWN_TICKER.to_string()
        } else {
            cells[2].clone()
        };

        holdings.push(ScrapedHolding {
            rank: cells[0].parse().ok(),
            ticker,
            weight: parse_weight(&cells[3]),
        });
    }

    if !saw_row {
        return Err(AppError::Parse("no holdings table in page".to_string()));
    }
    Ok(holdings)
}

/// Strip the percent sign and parse; unparseable weights become `None`
fn parse_weight(cell: &str) -> Option<f64> {
    let stripped = cell.trim().trim_end_matches('%').trim();
    if stripped.is_empty() {
        return None;
    }
    stripped.replace(',', "").parse().ok()
}
