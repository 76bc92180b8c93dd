use crate::error::Error;
use crate::services::freshness::{self, MarketStatusRecord};
use crate::services::PolygonClient;
use crate::utils::get_data_dir;

pub fn run() {
    match fetch_and_persist() {
        Ok(record) => {
            println!(
                "✅ Market status saved: {} (server time {})",
                record.market_status, record.server_time
            );
        }
        Err(e) => {
            eprintln!("❌ Market status fetch failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn fetch_and_persist() -> Result<MarketStatusRecord, Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let client = PolygonClient::from_env()?;
        let status = client.market_status().await?;

        let record = MarketStatusRecord {
            market_status: status.market,
            server_time: status.server_time,
        };
        freshness::write_market_status(&get_data_dir(), &record)?;
        Ok(record)
    })
}
