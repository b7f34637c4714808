//! SQL migration definitions for the run-metadata database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as a batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: runs_metadata",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per scrape run
CREATE TABLE IF NOT EXISTS runs_metadata (
    run_id                 TEXT PRIMARY KEY,
    start_time             TEXT NOT NULL,
    end_time               TEXT,
    duration_seconds       REAL NOT NULL,
    scraper_version        TEXT NOT NULL,
    config                 TEXT NOT NULL,
    tender_types_processed TEXT NOT NULL,
    pages_visited          INTEGER NOT NULL,
    tenders_parsed         INTEGER NOT NULL,
    tenders_saved          INTEGER NOT NULL,
    failures               INTEGER NOT NULL,
    deduped_count          INTEGER NOT NULL,
    error_summary          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_start_time ON runs_metadata(start_time);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
