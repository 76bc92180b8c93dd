use crate::error::Error;
use crate::models::ChartRange;
use crate::services::{queries, Database};
use crate::utils::get_data_dir;

pub fn run(ticker: String, chart: Option<String>) {
    let range = match chart.as_deref().map(ChartRange::parse) {
        Some(None) => {
            eprintln!("❌ Unknown chart range (expected one of 1D, 1W, 1M, 3M, 6M, YTD, 1Y)");
            std::process::exit(1);
        }
        Some(Some(range)) => Some(range),
        None => None,
    };

    match show(&ticker.to_uppercase(), range) {
        Ok(()) => {}
        Err(Error::NotFound(what)) => {
            eprintln!("❌ Not found: {}", what);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ Stock lookup failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn show(ticker: &str, range: Option<ChartRange>) -> Result<(), Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let db = Database::open_default().await?;
        let view = queries::find_stock(&db, ticker).await?;

        let master = &view.master;
        println!("{} — {}", master.ticker, master.name);
        println!(
            "  close {:.2}  change {:+.2} ({:+.2}%)  volume {}",
            master.day_close, master.todays_change, master.todays_change_perc, master.volume
        );
        println!(
            "  exchange {}  type {}",
            master.primary_exchange,
            master.ticker_type.as_deref().unwrap_or("-")
        );

        match &view.detail {
            Some(detail) => {
                if let Some(industry) = &detail.industry {
                    println!("  industry: {}", industry);
                }
                if let (Some(dma_200), Some(diff)) = (detail.dma_200, detail.dma_200_perc_diff) {
                    println!("  200-DMA {:.2} ({:+.2}% off)", dma_200, diff);
                }
                if let Some(dma_50) = detail.dma_50 {
                    println!("  50-DMA {:.2}", dma_50);
                }
                if let (Some(low), Some(high)) = (detail.low_52w, detail.high_52w) {
                    println!("  52-week range {:.2} – {:.2}", low, high);
                }
                if !view.related.is_empty() {
                    println!("  related: {}", view.related.join(", "));
                }
            }
            None => println!("  (no rich record this cycle)"),
        }

        if let Some(range) = range {
            let bars = queries::chart_bars(&db, &get_data_dir(), ticker, range).await?;
            match queries::series_change_perc(&bars) {
                Some(change) => println!("  {} chart: {} bars, {:+.2}%", range, bars.len(), change),
                None => println!("  {} chart: {} bars", range, bars.len()),
            }
        }

        db.close().await;
        Ok(())
    })
}
