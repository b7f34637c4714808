//! Id-based deduplication for tenders.
//!
//! A [`Deduplicator`] holds the seen-set of tender ids for one batch run.
//! The persister seeds it with every previously stored id before filtering
//! a new batch, so cross-run duplicates are suppressed identically to
//! within-run duplicates.

use std::collections::HashSet;

use crate::types::Tender;

/// Stateful filter keyed on `Tender::id`.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen_ids: HashSet<String>,
}

impl Deduplicator {
    /// Create an empty deduplicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tender's id as seen.
    pub fn mark_seen(&mut self, tender: &Tender) {
        self.seen_ids.insert(tender.id.clone());
    }

    /// Register a bare id as seen (used when seeding from persisted data).
    pub fn mark_seen_id(&mut self, id: &str) {
        self.seen_ids.insert(id.to_string());
    }

    /// Whether this tender's id has already been registered.
    pub fn is_duplicate(&self, tender: &Tender) -> bool {
        self.seen_ids.contains(&tender.id)
    }

    /// Filter `tenders` down to first occurrences of unseen ids, in the
    /// original order, registering each accepted id. Duplicates within the
    /// input collapse too.
    pub fn deduplicate(&mut self, tenders: Vec<Tender>) -> Vec<Tender> {
        let mut unique = Vec::with_capacity(tenders.len());
        for tender in tenders {
            if !self.is_duplicate(&tender) {
                self.mark_seen(&tender);
                unique.push(tender);
            }
        }
        unique
    }

    /// Number of ids registered so far.
    pub fn seen_count(&self) -> usize {
        self.seen_ids.len()
    }
}
