//! Error types for tenderscrape.
//!
//! Library crates use [`TenderScrapeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all tenderscrape operations.
#[derive(Debug, thiserror::Error)]
pub enum TenderScrapeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during fetch (surfaces after retries are exhausted).
    #[error("network error: {0}")]
    Network(String),

    /// HTML or JSON extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Tender store or metadata database error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Record validation error (missing id, sentinel id, bad shape).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TenderScrapeError>;

impl TenderScrapeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable category key under which this error is recorded in a
    /// run summary's error map.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config_error",
            Self::Network(_) => "network_error",
            Self::Parse { .. } => "parse_error",
            Self::Storage(_) => "storage_error",
            Self::Io { .. } => "io_error",
            Self::Validation { .. } => "validation_error",
        }
    }
}
