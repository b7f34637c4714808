//! Core domain types for tenderscrape.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel id emitted by some portal responses for rows without a real
/// identifier. Records carrying it are rejected during cleaning.
pub const UNKNOWN_ID_SENTINEL: &str = "UNKNOWN";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for scrape run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// TenderType
// ---------------------------------------------------------------------------

/// Closed classification of a tender's procurement category.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TenderType {
    Goods,
    Works,
    Services,
}

impl TenderType {
    /// Classify free-form type text by case-insensitive substring match,
    /// in priority order. Unrecognized text falls back to `Works`.
    pub fn classify(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        if upper.contains("GOOD") {
            Self::Goods
        } else if upper.contains("WORK") {
            Self::Works
        } else if upper.contains("SERV") {
            Self::Services
        } else {
            Self::Works
        }
    }

    /// Canonical display name, matching the persisted representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Goods => "Goods",
            Self::Works => "Works",
            Self::Services => "Services",
        }
    }
}

impl std::fmt::Display for TenderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tender
// ---------------------------------------------------------------------------

/// A normalized procurement listing. Constructed once by the cleaner and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tender {
    /// Portal-assigned identifier; unique key for deduplication.
    pub id: String,
    /// Procurement category.
    pub tender_type: TenderType,
    /// Whitespace-normalized title.
    pub title: String,
    /// Whitespace-normalized issuing organization.
    pub organization: String,
    /// Publication date; defaults to the scrape date when the source
    /// omits or mangles it.
    pub publish_date: NaiveDate,
    /// Bid closing date; `None` when the source omits or mangles it.
    pub closing_date: Option<NaiveDate>,
    /// Description with trailing boilerplate stripped.
    pub description: String,
    /// Absolute URL of the tender detail page.
    pub source_url: String,
    /// Attachment references, possibly empty.
    pub attachments: Vec<String>,
    /// Bounded excerpt of the originating markup, for audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_snippet: Option<String>,
    /// When this record was ingested.
    pub ingested_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

/// Per-run execution record: configuration snapshot, stage counters, and
/// outcome. Created at orchestration start, finalized and persisted
/// exactly once — on success or on fatal failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Globally unique run identifier.
    pub run_id: RunId,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished (set by [`RunSummary::finish`]).
    pub finished_at: Option<DateTime<Utc>>,
    /// Derived wall-clock duration in seconds.
    pub duration_seconds: f64,
    /// Version of the scraper that produced this run.
    pub scraper_version: String,
    /// Snapshot of the effective configuration.
    pub config: serde_json::Value,
    /// Distinct tender types observed during cleaning.
    pub tender_types: BTreeSet<TenderType>,
    /// Listing documents fetched.
    pub pages_visited: u32,
    /// Raw records extracted by the parser.
    pub tenders_parsed: u32,
    /// Newly-unique records persisted.
    pub tenders_saved: u32,
    /// Records rejected during cleaning.
    pub failures: u32,
    /// Records dropped as duplicates of already-persisted ids.
    pub deduped_count: u32,
    /// Error category → message, for fatal failures.
    pub error_summary: BTreeMap<String, String>,
}

impl RunSummary {
    /// Create a summary for a run starting now.
    pub fn new(scraper_version: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            run_id: RunId::new(),
            started_at: Utc::now(),
            finished_at: None,
            duration_seconds: 0.0,
            scraper_version: scraper_version.into(),
            config,
            tender_types: BTreeSet::new(),
            pages_visited: 0,
            tenders_parsed: 0,
            tenders_saved: 0,
            failures: 0,
            deduped_count: 0,
            error_summary: BTreeMap::new(),
        }
    }

    /// Record an observed tender type.
    pub fn observe_type(&mut self, tender_type: TenderType) {
        self.tender_types.insert(tender_type);
    }

    /// Record a fatal error under its category key.
    pub fn record_error(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.error_summary.insert(category.into(), message.into());
    }

    /// Mark the run finished and derive its duration.
    pub fn finish(&mut self) {
        let now = Utc::now();
        self.duration_seconds = (now - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.finished_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn type_classification_table() {
        assert_eq!(TenderType::classify("GOODS"), TenderType::Goods);
        assert_eq!(TenderType::classify("consumable goods"), TenderType::Goods);
        assert_eq!(TenderType::classify("Works Contract"), TenderType::Works);
        assert_eq!(TenderType::classify("IT Services"), TenderType::Services);
        assert_eq!(TenderType::classify("xyz"), TenderType::Works);
    }

    #[test]
    fn type_classification_priority_order() {
        // GOOD wins over SERV when both substrings are present.
        assert_eq!(
            TenderType::classify("goods and services"),
            TenderType::Goods
        );
    }

    #[test]
    fn tender_serialization_shape() {
        let tender = Tender {
            id: "482915".into(),
            tender_type: TenderType::Goods,
            title: "Supply of survey equipment".into(),
            organization: "Roads and Buildings Department".into(),
            publish_date: NaiveDate::from_ymd_opt(2024, 4, 3).unwrap(),
            closing_date: None,
            description: "Supply of survey equipment".into(),
            source_url: "https://tenders.example.gov/tender/482915".into(),
            attachments: vec![],
            raw_snippet: None,
            ingested_at: Utc::now(),
        };

        let json = serde_json::to_value(&tender).expect("serialize");
        assert_eq!(json["publish_date"], "2024-04-03");
        assert_eq!(json["closing_date"], serde_json::Value::Null);
        assert_eq!(json["tender_type"], "Goods");
        // Absent snippet is omitted entirely.
        assert!(json.get("raw_snippet").is_none());

        let back: Tender = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.id, "482915");
    }

    #[test]
    fn run_summary_finish_derives_duration() {
        let mut summary = RunSummary::new("0.1.0", serde_json::json!({"limit": 50}));
        assert!(summary.finished_at.is_none());

        summary.observe_type(TenderType::Works);
        summary.observe_type(TenderType::Works);
        summary.record_error("network_error", "connection refused");
        summary.finish();

        assert!(summary.finished_at.is_some());
        assert!(summary.duration_seconds >= 0.0);
        assert_eq!(summary.tender_types.len(), 1);
        assert_eq!(
            summary.error_summary.get("network_error").map(String::as_str),
            Some("connection refused")
        );
    }
}
