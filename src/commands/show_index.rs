use crate::error::Error;
use crate::services::{queries, Database};

pub fn run(slug: Option<String>) {
    match show(slug) {
        Ok(()) => {}
        Err(Error::NotFound(what)) => {
            eprintln!("❌ Not found: {}", what);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ Index lookup failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn show(slug: Option<String>) -> Result<(), Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let db = Database::open_default().await?;

        match slug {
            None => {
                for index in queries::all_indices(&db).await? {
                    println!("{:<20} {}", index.slug, index.name);
                }
            }
            Some(slug) => {
                let view = queries::index_with_holdings(&db, &slug).await?;
                println!("{} ({} holdings)", view.index.name, view.holdings.len());
                for holding in &view.holdings {
                    println!(
                        "  {:<8} {:<32} weight {}  close {:.2}  200-DMA diff {}",
                        holding.ticker,
                        holding.name,
                        holding
                            .weight
                            .map(|w| format!("{:.2}%", w))
                            .unwrap_or_else(|| "-".to_string()),
                        holding.day_close,
                        holding
                            .dma_200_perc_diff
                            .map(|d| format!("{:+.2}%", d))
                            .unwrap_or_else(|| "-".to_string()),
                    );
                }
            }
        }

        db.close().await;
        Ok(())
    })
}
