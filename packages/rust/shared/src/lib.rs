//! Shared types, error model, and configuration for tenderscrape.
//!
//! This crate is the foundation depended on by all other tenderscrape crates.
//! It provides:
//! - [`TenderScrapeError`] — the unified error type
//! - Domain types ([`Tender`], [`TenderType`], [`RunSummary`], [`RunId`])
//! - The [`Deduplicator`] seen-set
//! - Configuration ([`AppConfig`], [`ScrapeConfig`], config loading)

pub mod config;
pub mod dedup;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LimitsConfig, ListingMode, OutputConfig, ScrapeConfig, SourceConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use dedup::Deduplicator;
pub use error::{Result, TenderScrapeError};
pub use types::{RunId, RunSummary, Tender, TenderType, UNKNOWN_ID_SENTINEL};
