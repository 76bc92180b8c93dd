use crate::error::Error;
use crate::services::{freshness, Database, IndexScraper, PolygonClient, RefreshEngine};
use crate::utils::get_data_dir;

pub fn run(force: bool) {
    let data_dir = get_data_dir();

    // Market-open gate: a closed market means yesterday's data is final
    if !force && !freshness::is_market_open(&data_dir) {
        println!("⏸  Market is not open; skipping refresh (use --force to override)");
        return;
    }

    match run_cycle() {
        Ok(()) => {
            println!("\n✅ Database refresh completed!");
        }
        Err(e) => {
            eprintln!("\n❌ Database refresh failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_cycle() -> Result<(), Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let client = PolygonClient::from_env()?;
        let scraper = IndexScraper::new()?;
        let db = Database::open_default().await?;
        let data_dir = get_data_dir();

        let engine = RefreshEngine::new(&db, &client, &scraper, data_dir);
        let summary = engine.run().await?;

        println!(
            "   master rows: {}, indices: {}, stocks: {} (+{} backfilled)",
            summary.replace.masters,
            summary.replace.indices,
            summary.replace.stocks,
            summary.appended_stocks,
        );
        println!(
            "   holdings: {} ({} dropped), chart bars: {}, mover lists: {} scopes / {} rows",
            summary.replace.holdings,
            summary.replace.holdings_dropped,
            summary.replace.bars,
            summary.mover_scopes,
            summary.mover_rows,
        );

        db.close().await;
        Ok(())
    })
}
