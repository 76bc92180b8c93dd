use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser)]
#[command(name = "stocktracker")]
#[command(about = "U.S. stock index tracker data pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one full database refresh cycle
    Refresh {
        /// Refresh even when the persisted market status is not open
        #[arg(long)]
        force: bool,
    },
    /// Fetch the current market status and persist the refresh gate
    MarketStatus,
    /// Show row counts and data freshness
    Status,
    /// Look up one stock from the refreshed database
    ShowStock {
        ticker: String,
        /// Also summarize a chart range (1D, 1W, 1M, 3M, 6M, YTD, 1Y)
        #[arg(long)]
        chart: Option<String>,
    },
    /// List indices, or show one index's holdings
    ShowIndex {
        slug: Option<String>,
    },
}

pub fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Refresh { force } => {
            commands::refresh::run(force);
        }
        Commands::MarketStatus => {
            commands::market_status::run();
        }
        Commands::Status => {
            commands::status::run();
        }
        Commands::ShowStock { ticker, chart } => {
            commands::show_stock::run(ticker, chart);
        }
        Commands::ShowIndex { slug } => {
            commands::show_index::run(slug);
        }
    }
}
