//! End-to-end scrape pipeline: fetch → parse → clean → dedup → persist.
//!
//! One invocation is one run. The run summary is finalized and written to
//! the metadata store exactly once, on success and on fatal failure alike;
//! a failing stage short-circuits the rest of the pipeline but never the
//! summary write.

use tracing::{error, info, instrument, warn};

use tenderscrape_scraper::{
    ApiMethod, Fetcher, clean_record, parse_listing_html, parse_listing_json,
};
use tenderscrape_shared::{ListingMode, Result, RunSummary, ScrapeConfig, TenderScrapeError};
use tenderscrape_storage::{RunStore, TenderStore};

/// Version stamped into every run summary.
pub const SCRAPER_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each record passes through cleaning.
    fn record_cleaned(&self, current: usize, total: usize);
    /// Called when the run completes successfully.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_cleaned(&self, _current: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Result of a completed scrape run.
#[derive(Debug)]
pub struct ScrapeOutcome {
    /// The finalized, persisted run summary.
    pub summary: RunSummary,
    /// Records in the tender store after this run.
    pub total_stored: usize,
}

/// Run the full scrape pipeline.
///
/// On a fatal stage error the summary is still finalized and persisted
/// with the error recorded under its category, then the error is returned
/// to the caller.
pub async fn run_scrape(
    config: &ScrapeConfig,
    progress: &dyn ProgressReporter,
) -> Result<ScrapeOutcome> {
    let snapshot = serde_json::to_value(config)
        .map_err(|e| TenderScrapeError::config(format!("unserializable config: {e}")))?;
    let mut summary = RunSummary::new(SCRAPER_VERSION, snapshot);

    info!(run_id = %summary.run_id, mode = %config.mode, "starting scrape run");

    // The metadata store opens before any stage runs, so a failing run can
    // still record itself.
    let runs = RunStore::open(&config.metadata_db).await?;

    let result = execute(config, progress, &mut summary).await;

    match result {
        Ok(total_stored) => {
            summary.finish();
            runs.upsert_run_summary(&summary).await?;
            progress.done(&summary);
            info!(
                run_id = %summary.run_id,
                parsed = summary.tenders_parsed,
                saved = summary.tenders_saved,
                failures = summary.failures,
                deduped = summary.deduped_count,
                duration_s = summary.duration_seconds,
                "scrape run completed"
            );
            Ok(ScrapeOutcome {
                summary,
                total_stored,
            })
        }
        Err(err) => {
            error!(run_id = %summary.run_id, error = %err, "scrape run failed");
            summary.record_error(err.category(), err.to_string());
            summary.finish();
            if let Err(persist_err) = runs.upsert_run_summary(&summary).await {
                error!(error = %persist_err, "failed to persist summary of failed run");
            }
            Err(err)
        }
    }
}

/// The fallible stage sequence. The fetcher lives only inside this scope,
/// so its connection pool is released on every exit path.
#[instrument(skip_all, fields(run_id = %summary.run_id))]
async fn execute(
    config: &ScrapeConfig,
    progress: &dyn ProgressReporter,
    summary: &mut RunSummary,
) -> Result<usize> {
    let fetcher = Fetcher::new(config)?;

    // --- Fetch + parse ---
    progress.phase("Fetching listing");
    let mut raw_records = match config.mode {
        ListingMode::Api => {
            let body = fetcher
                .fetch_api(&config.list_endpoint, ApiMethod::Post, None)
                .await?;
            summary.pages_visited += 1;
            progress.phase("Parsing listing");
            parse_listing_json(&body, &config.base_url)
        }
        ListingMode::Html => {
            let html = fetcher.fetch_page(&config.base_url).await?;
            summary.pages_visited += 1;
            progress.phase("Parsing listing");
            parse_listing_html(&html, &config.base_url)
        }
    };
    summary.tenders_parsed = raw_records.len() as u32;

    if raw_records.len() > config.limit {
        info!(
            parsed = raw_records.len(),
            limit = config.limit,
            "truncating parsed records to run limit"
        );
        raw_records.truncate(config.limit);
    }

    // --- Clean ---
    progress.phase("Cleaning records");
    let total = raw_records.len();
    let mut cleaned = Vec::with_capacity(total);
    for (i, raw) in raw_records.iter().enumerate() {
        match clean_record(raw) {
            Ok(tender) => {
                summary.observe_type(tender.tender_type);
                cleaned.push(tender);
            }
            Err(err) => {
                warn!(
                    tender_id = raw.tender_id.as_deref().unwrap_or("<missing>"),
                    error = %err,
                    "record rejected during cleaning"
                );
                summary.failures += 1;
            }
        }
        progress.record_cleaned(i + 1, total);
    }
    info!(
        cleaned = cleaned.len(),
        failures = summary.failures,
        "cleaning complete"
    );

    // --- Dedup + persist ---
    progress.phase("Persisting tenders");
    let store = TenderStore::new(&config.tenders_path);
    let outcome = store.save_batch(cleaned)?;
    summary.tenders_saved = outcome.saved as u32;
    summary.deduped_count = outcome.duplicates as u32;

    Ok(outcome.total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tenderscrape_shared::AppConfig;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct TestEnv {
        config: ScrapeConfig,
        #[allow(dead_code)]
        dir: PathBuf,
    }

    fn test_env(base_url: &str, mode: &str) -> TestEnv {
        let dir = std::env::temp_dir().join(format!("ts_pipeline_{}", Uuid::now_v7()));
        let mut app = AppConfig::default();
        app.source.base_url = base_url.to_string();
        app.source.list_endpoint = "/list".into();
        app.source.mode = mode.into();
        app.limits.rate_limit = 0.0;
        app.limits.max_retries = 1;
        app.limits.timeout_seconds = 5;
        app.output.tenders_path = dir.join("tenders.json").to_string_lossy().into_owned();
        app.output.metadata_db = dir.join("runs.db").to_string_lossy().into_owned();

        TestEnv {
            config: ScrapeConfig::try_from(&app).expect("test config"),
            dir,
        }
    }

    fn listing_body() -> serde_json::Value {
        serde_json::json!({
            "data": [
                {
                    "id": "301",
                    "title": "Road widening works",
                    "organization": "Roads Department",
                    "type": "Works",
                    "publishDate": "03/04/2024",
                    "closingDate": "20/04/2024",
                    "description": "Road widening. For more details visit the office."
                },
                {
                    "id": "302",
                    "title": "Hospital supplies",
                    "organization": "Health Department",
                    "type": "Goods",
                    "publishDate": "04/04/2024",
                    "closingDate": ""
                },
                {
                    "id": "303",
                    "title": "Security services",
                    "organization": "Home Department",
                    "type": "IT Services",
                    "publishDate": "05/04/2024",
                    "closingDate": "25/04/2024"
                }
            ]
        })
    }

    async fn mount_listing(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn api_mode_end_to_end() {
        let server = MockServer::start().await;
        mount_listing(&server, listing_body()).await;

        let env = test_env(&server.uri(), "api");
        let outcome = run_scrape(&env.config, &SilentProgress).await.expect("run");

        let summary = &outcome.summary;
        assert_eq!(summary.pages_visited, 1);
        assert_eq!(summary.tenders_parsed, 3);
        assert_eq!(summary.tenders_saved, 3);
        assert_eq!(summary.failures, 0);
        assert_eq!(summary.deduped_count, 0);
        assert_eq!(summary.tender_types.len(), 3);
        assert!(summary.finished_at.is_some());
        assert!(summary.error_summary.is_empty());
        assert_eq!(outcome.total_stored, 3);

        // Records persisted in source order, normalized.
        let stored = TenderStore::new(&env.config.tenders_path).load().unwrap();
        let ids: Vec<_> = stored.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["301", "302", "303"]);
        assert_eq!(stored[0].description, "Road widening.");
        assert_eq!(stored[1].closing_date, None);

        // Summary row written to the metadata store.
        let runs = RunStore::open(&env.config.metadata_db).await.unwrap();
        let row = runs
            .get_run_summary(&summary.run_id.to_string())
            .await
            .unwrap();
        assert!(row.is_some());
        assert_eq!(row.unwrap().tenders_saved, 3);
    }

    #[tokio::test]
    async fn second_run_over_same_listing_saves_nothing() {
        let server = MockServer::start().await;
        mount_listing(&server, listing_body()).await;

        let env = test_env(&server.uri(), "api");
        let first = run_scrape(&env.config, &SilentProgress).await.expect("run 1");
        assert_eq!(first.summary.tenders_saved, 3);

        let second = run_scrape(&env.config, &SilentProgress).await.expect("run 2");
        assert_eq!(second.summary.tenders_saved, 0);
        assert_eq!(second.summary.deduped_count, 3);
        assert_eq!(second.total_stored, 3);

        // Two distinct run rows, one unchanged tender file.
        let runs = RunStore::open(&env.config.metadata_db).await.unwrap();
        assert_eq!(runs.list_recent_runs(10).await.unwrap().len(), 2);
        let stored = TenderStore::new(&env.config.tenders_path).load().unwrap();
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn rejected_records_are_counted_not_fatal() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            serde_json::json!([
                {"id": "401", "title": "Valid", "type": "Goods"},
                {"id": "UNKNOWN", "title": "Sentinel id"},
                {"title": "Missing id entirely"}
            ]),
        )
        .await;

        let env = test_env(&server.uri(), "api");
        let outcome = run_scrape(&env.config, &SilentProgress).await.expect("run");

        assert_eq!(outcome.summary.tenders_parsed, 3);
        assert_eq!(outcome.summary.failures, 2);
        assert_eq!(outcome.summary.tenders_saved, 1);
    }

    #[tokio::test]
    async fn run_limit_truncates_after_parsing() {
        let server = MockServer::start().await;
        mount_listing(&server, listing_body()).await;

        let mut env = test_env(&server.uri(), "api");
        env.config.limit = 2;
        let outcome = run_scrape(&env.config, &SilentProgress).await.expect("run");

        // Parsed counts the full listing; only the first two proceed.
        assert_eq!(outcome.summary.tenders_parsed, 3);
        assert_eq!(outcome.summary.tenders_saved, 2);

        let stored = TenderStore::new(&env.config.tenders_path).load().unwrap();
        let ids: Vec<_> = stored.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["301", "302"]);
    }

    #[tokio::test]
    async fn html_mode_end_to_end() {
        let server = MockServer::start().await;
        let html = r#"<html><body><table class="dataTable">
            <tr><th>Title</th><th>Org</th><th>Type</th><th>Published</th><th>Closing</th></tr>
            <tr>
              <td><a href="/tender/501">Bridge painting</a></td>
              <td>Bridges Authority</td>
              <td>Works</td>
              <td>01/05/2024</td>
              <td>21/05/2024</td>
            </tr>
        </table></body></html>"#;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let env = test_env(&server.uri(), "html");
        let outcome = run_scrape(&env.config, &SilentProgress).await.expect("run");

        assert_eq!(outcome.summary.tenders_parsed, 1);
        assert_eq!(outcome.summary.tenders_saved, 1);

        let stored = TenderStore::new(&env.config.tenders_path).load().unwrap();
        assert_eq!(stored[0].id, "501");
        assert_eq!(stored[0].organization, "Bridges Authority");
        assert!(stored[0].raw_snippet.is_some());
    }

    #[tokio::test]
    async fn empty_listing_completes_with_zero_counts() {
        let server = MockServer::start().await;
        mount_listing(&server, serde_json::json!({"data": []})).await;

        let env = test_env(&server.uri(), "api");
        let outcome = run_scrape(&env.config, &SilentProgress).await.expect("run");
        assert_eq!(outcome.summary.tenders_parsed, 0);
        assert_eq!(outcome.summary.tenders_saved, 0);
        assert_eq!(outcome.total_stored, 0);
    }

    #[tokio::test]
    async fn fatal_fetch_failure_still_persists_the_summary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let env = test_env(&server.uri(), "api");
        let err = run_scrape(&env.config, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, TenderScrapeError::Network(_)));

        let runs = RunStore::open(&env.config.metadata_db).await.unwrap();
        let rows = runs.list_recent_runs(10).await.unwrap();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert!(row.finished_at.is_some());
        assert!(row.error_summary.contains_key("network_error"));
        assert_eq!(row.tenders_saved, 0);
    }
}
