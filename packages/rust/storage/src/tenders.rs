//! The persisted tender collection: a single JSON array file.
//!
//! Persistence is a read-modify-write over the whole dataset, not a
//! transactional append. A single orchestrator run owns the path at a
//! time; concurrent writers are not supported.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use tenderscrape_shared::{Deduplicator, Result, Tender, TenderScrapeError};

/// Outcome of persisting one batch.
#[derive(Debug, Clone, Copy)]
pub struct SaveOutcome {
    /// Newly-unique records appended this batch.
    pub saved: usize,
    /// Incoming records dropped as duplicates.
    pub duplicates: usize,
    /// Records in the store after the write.
    pub total: usize,
}

/// Idempotent-append storage for tenders.
#[derive(Debug, Clone)]
pub struct TenderStore {
    path: PathBuf,
}

impl TenderStore {
    /// Create a store handle for `path`. Nothing is touched until the
    /// first load or save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full persisted collection. A missing file is an empty
    /// collection; an unreadable or malformed file degrades to empty with
    /// a warning rather than failing the run.
    pub fn load(&self) -> Result<Vec<Tender>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read existing tenders, starting empty");
                return Ok(Vec::new());
            }
        };

        match serde_json::from_str(&content) {
            Ok(tenders) => Ok(tenders),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not parse existing tenders, starting empty");
                Ok(Vec::new())
            }
        }
    }

    /// Merge a batch into the store: existing records keep their order,
    /// newly-unique incoming records append in arrival order, duplicates
    /// (against the store or within the batch) are dropped.
    pub fn save_batch(&self, incoming: Vec<Tender>) -> Result<SaveOutcome> {
        let existing = self.load()?;

        if incoming.is_empty() {
            warn!("no tenders to save");
            return Ok(SaveOutcome {
                saved: 0,
                duplicates: 0,
                total: existing.len(),
            });
        }

        let incoming_count = incoming.len();

        let mut dedup = Deduplicator::new();
        for tender in &existing {
            dedup.mark_seen(tender);
        }
        let unique = dedup.deduplicate(incoming);
        let saved = unique.len();

        let mut all = existing;
        all.extend(unique);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TenderScrapeError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&all)
            .map_err(|e| TenderScrapeError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| TenderScrapeError::io(&self.path, e))?;

        info!(saved, total = all.len(), "persisted tender batch");

        Ok(SaveOutcome {
            saved,
            duplicates: incoming_count - saved,
            total: all.len(),
        })
    }
}
