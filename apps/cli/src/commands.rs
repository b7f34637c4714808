//! CLI command definitions, routing, and tracing setup.

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use tenderscrape_core::pipeline::{ProgressReporter, run_scrape};
use tenderscrape_shared::{AppConfig, RunSummary, ScrapeConfig, init_config, load_config};
use tenderscrape_storage::RunStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// tenderscrape — extract tender listings from the procurement portal.
#[derive(Parser)]
#[command(
    name = "tenderscrape",
    version,
    about = "Scrape, normalize, and persist public procurement tender listings.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the scrape pipeline once.
    Scrape(ScrapeArgs),

    /// List recent runs from the metadata store.
    Runs {
        /// Maximum rows to show.
        #[arg(long, default_value = "10")]
        limit: u32,

        /// Path of the run-metadata database.
        #[arg(long, env = "METADATA_DB")]
        metadata_db: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `scrape`. Each overrides the config file, which overrides
/// the built-in defaults; env vars apply when the flag is absent.
#[derive(Args)]
pub(crate) struct ScrapeArgs {
    /// Maximum number of tenders to process this run.
    #[arg(long, env = "SCRAPE_LIMIT")]
    limit: Option<usize>,

    /// Rate limit in requests per second.
    #[arg(long, env = "RATE_LIMIT")]
    rate_limit: Option<f64>,

    /// Concurrent fetch slots (accepted, not used for fan-out).
    #[arg(long, env = "CONCURRENCY")]
    concurrency: Option<u32>,

    /// Total request attempts before a fetch fails.
    #[arg(long, env = "MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "TIMEOUT_SECONDS")]
    timeout: Option<u64>,

    /// Output file for tender data.
    #[arg(short, long, env = "OUTPUT_PATH")]
    output: Option<String>,

    /// Path of the run-metadata database.
    #[arg(long, env = "METADATA_DB")]
    metadata_db: Option<String>,

    /// User-Agent header sent with every request.
    #[arg(long, env = "USER_AGENT")]
    user_agent: Option<String>,

    /// Listing mode: api or html.
    #[arg(long)]
    mode: Option<String>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Scrape(args) => cmd_scrape(args).await,
        Command::Runs { limit, metadata_db } => cmd_runs(limit, metadata_db.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// scrape
// ---------------------------------------------------------------------------

async fn cmd_scrape(args: ScrapeArgs) -> Result<()> {
    let config = load_config()?;
    let mut scrape = ScrapeConfig::try_from(&config)?;

    if let Some(limit) = args.limit {
        scrape.limit = limit;
    }
    if let Some(rate_limit) = args.rate_limit {
        scrape.rate_limit = rate_limit;
    }
    if let Some(concurrency) = args.concurrency {
        scrape.concurrency = concurrency;
    }
    if let Some(max_retries) = args.max_retries {
        scrape.max_retries = max_retries;
    }
    if let Some(timeout) = args.timeout {
        scrape.timeout_seconds = timeout;
    }
    if let Some(output) = args.output {
        scrape.tenders_path = output.into();
    }
    if let Some(metadata_db) = args.metadata_db {
        scrape.metadata_db = metadata_db.into();
    }
    if let Some(user_agent) = args.user_agent {
        scrape.user_agent = user_agent;
    }
    if let Some(mode) = args.mode {
        scrape.mode = mode.parse()?;
    }

    info!(
        mode = %scrape.mode,
        limit = scrape.limit,
        rate_limit = scrape.rate_limit,
        "starting scrape"
    );

    let reporter = CliProgress::new();
    let outcome = run_scrape(&scrape, &reporter).await?;

    let summary = &outcome.summary;
    println!();
    println!("  Scrape run completed!");
    println!("  Run ID:    {}", summary.run_id);
    println!("  Parsed:    {}", summary.tenders_parsed);
    println!("  Saved:     {}", summary.tenders_saved);
    println!("  Duplicate: {}", summary.deduped_count);
    println!("  Failures:  {}", summary.failures);
    println!("  In store:  {}", outcome.total_stored);
    println!("  Time:      {:.1}s", summary.duration_seconds);
    println!("  Output:    {}", scrape.tenders_path.display());
    println!("  Metadata:  {}", scrape.metadata_db.display());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record_cleaned(&self, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Cleaning [{current}/{total}]"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// runs
// ---------------------------------------------------------------------------

async fn cmd_runs(limit: u32, metadata_db: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let db_path = metadata_db
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| config.output.metadata_db.clone().into());

    let store = RunStore::open(&db_path).await?;
    let runs = store.list_recent_runs(limit).await?;

    if runs.is_empty() {
        println!("No runs recorded in {}", db_path.display());
        return Ok(());
    }

    for run in runs {
        print_run_line(&run);
    }
    Ok(())
}

fn print_run_line(run: &RunSummary) {
    let status = if run.error_summary.is_empty() {
        "ok"
    } else {
        "failed"
    };
    println!(
        "{}  {}  {:6}  parsed={} saved={} deduped={} failures={}  {:.1}s",
        run.run_id,
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        status,
        run.tenders_parsed,
        run.tenders_saved,
        run.deduped_count,
        run.failures,
        run.duration_seconds,
    );
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
