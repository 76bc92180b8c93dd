use crate::error::Error;
use crate::services::{freshness, Database};
use crate::utils::{format_eastern, get_data_dir};

pub fn run() {
    match show_status() {
        Ok(()) => {}
        Err(e) => {
            eprintln!("❌ Status check failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn show_status() -> Result<(), Error> {
    let data_dir = get_data_dir();

    println!("📊 stocktracker status");
    println!("──────────────────────");

    match freshness::read_refresh_marker(&data_dir) {
        Some(marker) => {
            println!("Data as of: {}", format_eastern(marker.last_updated));
            println!("Last trading day: {}", marker.last_updated_date);
        }
        None => println!("Data as of: never refreshed"),
    }

    match freshness::read_market_status(&data_dir) {
        Some(record) => println!("Market status: {}", record.market_status),
        None => println!("Market status: unknown (run `stocktracker market-status`)"),
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let db = Database::open_default().await?;
        println!("\nTable rows:");
        for (table, count) in db.table_counts().await? {
            println!("  {:<16} {}", table, count);
        }
        db.close().await;
        Ok(())
    })
}
