//! Orchestration of the tenderscrape pipeline.

pub mod pipeline;

pub use pipeline::{
    ProgressReporter, SCRAPER_VERSION, ScrapeOutcome, SilentProgress, run_scrape,
};
