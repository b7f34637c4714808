//! tenderscrape CLI — batch scraper for public procurement listings.
//!
//! Fetches the portal's tender listing, normalizes and deduplicates the
//! records, and persists data plus run metadata.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);

    tokio::select! {
        result = commands::run(cli) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted.");
            std::process::exit(130);
        }
    }
}
