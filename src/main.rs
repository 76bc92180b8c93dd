mod cli;
mod commands;
mod constants;
mod error;
mod models;
mod services;
mod utils;

fn main() {
    // .env is optional; real deployments set the variables directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    cli::run();
}
