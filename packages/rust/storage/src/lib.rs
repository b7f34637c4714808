//! Persistence layer: the tender JSON store and the run-metadata database.
//!
//! [`TenderStore`] holds the scraped entities as a single JSON array file.
//! [`RunStore`] wraps a libSQL database with one row per scrape run.
//! The two stores are independent; only the run id ties them together in
//! logs.

mod migrations;
pub mod tenders;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};

use tenderscrape_shared::{Result, RunSummary, TenderScrapeError};

pub use tenders::{SaveOutcome, TenderStore};

/// Run-metadata storage handle wrapping a libSQL database.
pub struct RunStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl RunStore {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TenderScrapeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| TenderScrapeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| TenderScrapeError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    TenderScrapeError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Insert or replace the row for this summary's run id.
    pub async fn upsert_run_summary(&self, summary: &RunSummary) -> Result<()> {
        let config = summary.config.to_string();
        let tender_types = serde_json::to_string(&summary.tender_types)
            .map_err(|e| TenderScrapeError::Storage(e.to_string()))?;
        let error_summary = serde_json::to_string(&summary.error_summary)
            .map_err(|e| TenderScrapeError::Storage(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO runs_metadata (
                   run_id, start_time, end_time, duration_seconds, scraper_version,
                   config, tender_types_processed, pages_visited, tenders_parsed,
                   tenders_saved, failures, deduped_count, error_summary
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(run_id) DO UPDATE SET
                   start_time = excluded.start_time,
                   end_time = excluded.end_time,
                   duration_seconds = excluded.duration_seconds,
                   scraper_version = excluded.scraper_version,
                   config = excluded.config,
                   tender_types_processed = excluded.tender_types_processed,
                   pages_visited = excluded.pages_visited,
                   tenders_parsed = excluded.tenders_parsed,
                   tenders_saved = excluded.tenders_saved,
                   failures = excluded.failures,
                   deduped_count = excluded.deduped_count,
                   error_summary = excluded.error_summary",
                params![
                    summary.run_id.to_string(),
                    summary.started_at.to_rfc3339(),
                    summary.finished_at.map(|t| t.to_rfc3339()),
                    summary.duration_seconds,
                    summary.scraper_version.as_str(),
                    config.as_str(),
                    tender_types.as_str(),
                    i64::from(summary.pages_visited),
                    i64::from(summary.tenders_parsed),
                    i64::from(summary.tenders_saved),
                    i64::from(summary.failures),
                    i64::from(summary.deduped_count),
                    error_summary.as_str(),
                ],
            )
            .await
            .map_err(|e| TenderScrapeError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get the summary row for a run id.
    pub async fn get_run_summary(&self, run_id: &str) -> Result<Option<RunSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT run_id, start_time, end_time, duration_seconds, scraper_version,
                        config, tender_types_processed, pages_visited, tenders_parsed,
                        tenders_saved, failures, deduped_count, error_summary
                 FROM runs_metadata WHERE run_id = ?1",
                params![run_id],
            )
            .await
            .map_err(|e| TenderScrapeError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_run_summary(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(TenderScrapeError::Storage(e.to_string())),
        }
    }

    /// List the most recent runs, newest first.
    pub async fn list_recent_runs(&self, limit: u32) -> Result<Vec<RunSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT run_id, start_time, end_time, duration_seconds, scraper_version,
                        config, tender_types_processed, pages_visited, tenders_parsed,
                        tenders_saved, failures, deduped_count, error_summary
                 FROM runs_metadata ORDER BY start_time DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(|e| TenderScrapeError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_run_summary(&row)?);
        }
        Ok(results)
    }
}

/// Convert a database row to a [`RunSummary`].
fn row_to_run_summary(row: &libsql::Row) -> Result<RunSummary> {
    let run_id: String = row
        .get(0)
        .map_err(|e| TenderScrapeError::Storage(e.to_string()))?;
    let started_at = parse_timestamp(
        &row.get::<String>(1)
            .map_err(|e| TenderScrapeError::Storage(e.to_string()))?,
    )?;
    let finished_at = match row.get::<String>(2) {
        Ok(s) => Some(parse_timestamp(&s)?),
        Err(_) => None,
    };

    let config: String = row
        .get(5)
        .map_err(|e| TenderScrapeError::Storage(e.to_string()))?;
    let tender_types: String = row
        .get(6)
        .map_err(|e| TenderScrapeError::Storage(e.to_string()))?;
    let error_summary: String = row
        .get(12)
        .map_err(|e| TenderScrapeError::Storage(e.to_string()))?;

    Ok(RunSummary {
        run_id: run_id
            .parse()
            .map_err(|e| TenderScrapeError::Storage(format!("invalid run id: {e}")))?,
        started_at,
        finished_at,
        duration_seconds: row
            .get::<f64>(3)
            .map_err(|e| TenderScrapeError::Storage(e.to_string()))?,
        scraper_version: row
            .get::<String>(4)
            .map_err(|e| TenderScrapeError::Storage(e.to_string()))?,
        config: serde_json::from_str(&config)
            .map_err(|e| TenderScrapeError::Storage(format!("invalid config blob: {e}")))?,
        tender_types: serde_json::from_str(&tender_types)
            .map_err(|e| TenderScrapeError::Storage(format!("invalid type list: {e}")))?,
        pages_visited: get_counter(row, 7)?,
        tenders_parsed: get_counter(row, 8)?,
        tenders_saved: get_counter(row, 9)?,
        failures: get_counter(row, 10)?,
        deduped_count: get_counter(row, 11)?,
        error_summary: serde_json::from_str(&error_summary)
            .map_err(|e| TenderScrapeError::Storage(format!("invalid error map: {e}")))?,
    })
}

fn get_counter(row: &libsql::Row, index: i32) -> Result<u32> {
    row.get::<i64>(index)
        .map(|v| v as u32)
        .map_err(|e| TenderScrapeError::Storage(e.to_string()))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TenderScrapeError::Storage(format!("invalid timestamp: {e}")))
}
