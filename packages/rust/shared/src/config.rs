//! Application configuration for tenderscrape.
//!
//! User config lives at `~/.tenderscrape/tenderscrape.toml`.
//! CLI flags (with environment fallbacks) override config file values,
//! which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TenderScrapeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "tenderscrape.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".tenderscrape";

// ---------------------------------------------------------------------------
// Config structs (matching tenderscrape.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listing source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Rate, retry, and volume limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Output locations.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Portal base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Listing endpoint path, fetched via POST in `api` mode.
    #[serde(default = "default_list_endpoint")]
    pub list_endpoint: String,

    /// Listing mode: "api" (JSON endpoint) or "html" (portal root table).
    #[serde(default = "default_mode")]
    pub mode: String,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            list_endpoint: default_list_endpoint(),
            mode: default_mode(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://tender.nprocure.com".into()
}
fn default_list_endpoint() -> String {
    "/beforeLoginTenderTableList".into()
}
fn default_mode() -> String {
    "api".into()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
}

/// `[limits]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Requests per second (start-to-start).
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,

    /// Concurrent fetch slots. Accepted and recorded, but the pipeline
    /// issues a single listing fetch per run and does not fan out.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Total request attempts before a fetch fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Maximum records processed per run.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limit: default_rate_limit(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            timeout_seconds: default_timeout_seconds(),
            limit: default_limit(),
        }
    }
}

fn default_rate_limit() -> f64 {
    1.0
}
fn default_concurrency() -> u32 {
    2
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_seconds() -> u64 {
    30
}
fn default_limit() -> usize {
    50
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Path of the persisted tender JSON file.
    #[serde(default = "default_tenders_path")]
    pub tenders_path: String,

    /// Path of the run-metadata database.
    #[serde(default = "default_metadata_db")]
    pub metadata_db: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tenders_path: default_tenders_path(),
            metadata_db: default_metadata_db(),
        }
    }
}

fn default_tenders_path() -> String {
    "output/tenders.json".into()
}
fn default_metadata_db() -> String {
    "metadata/runs.db".into()
}

// ---------------------------------------------------------------------------
// Listing mode
// ---------------------------------------------------------------------------

/// How the listing document is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingMode {
    /// POST the configured endpoint and parse the JSON body.
    Api,
    /// GET the portal root and parse the HTML table.
    Html,
}

impl std::str::FromStr for ListingMode {
    type Err = TenderScrapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "html" => Ok(Self::Html),
            other => Err(TenderScrapeError::config(format!(
                "unknown listing mode '{other}': expected 'api' or 'html'"
            ))),
        }
    }
}

impl std::fmt::Display for ListingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api => f.write_str("api"),
            Self::Html => f.write_str("html"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scrape config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime scrape configuration — merged from config file + CLI flags.
/// Serialized verbatim into the run summary as the config snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeConfig {
    /// Portal base URL.
    pub base_url: Url,
    /// Listing endpoint path (api mode).
    pub list_endpoint: String,
    /// Listing acquisition mode.
    pub mode: ListingMode,
    /// User-Agent header.
    pub user_agent: String,
    /// Requests per second.
    pub rate_limit: f64,
    /// Concurrent fetch slots (recorded, not used for fan-out).
    pub concurrency: u32,
    /// Total request attempts before a fetch fails.
    pub max_retries: u32,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Maximum records processed per run.
    pub limit: usize,
    /// Persisted tender JSON file.
    pub tenders_path: PathBuf,
    /// Run-metadata database path.
    pub metadata_db: PathBuf,
}

impl TryFrom<&AppConfig> for ScrapeConfig {
    type Error = TenderScrapeError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let base_url = Url::parse(&config.source.base_url).map_err(|e| {
            TenderScrapeError::config(format!(
                "invalid base_url '{}': {e}",
                config.source.base_url
            ))
        })?;

        Ok(Self {
            base_url,
            list_endpoint: config.source.list_endpoint.clone(),
            mode: config.source.mode.parse()?,
            user_agent: config.source.user_agent.clone(),
            rate_limit: config.limits.rate_limit,
            concurrency: config.limits.concurrency,
            max_retries: config.limits.max_retries,
            timeout_seconds: config.limits.timeout_seconds,
            limit: config.limits.limit,
            tenders_path: PathBuf::from(&config.output.tenders_path),
            metadata_db: PathBuf::from(&config.output.metadata_db),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.tenderscrape/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TenderScrapeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.tenderscrape/tenderscrape.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TenderScrapeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        TenderScrapeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TenderScrapeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TenderScrapeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TenderScrapeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
