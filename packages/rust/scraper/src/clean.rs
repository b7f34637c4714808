//! Normalization of raw records into validated tenders.
//!
//! Each rule is a small pass. A record that fails validation is rejected
//! as a whole; the orchestrator logs and counts the rejection.

use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use tracing::warn;

use tenderscrape_shared::{Result, Tender, TenderScrapeError, TenderType, UNKNOWN_ID_SENTINEL};

use crate::record::RawRecord;

/// Upper bound on the stored markup excerpt.
const MAX_SNIPPET_CHARS: usize = 500;

/// Whitespace runs collapse to a single space.
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Trailing time-of-day component on a date string (e.g. " 14:30 IST").
static TRAILING_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d{1,2}:\d{2}.*$").expect("valid regex"));

/// Trailing promotional/navigational phrases, each truncating the
/// description from its match point to the end.
static BOILERPLATE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)For more details.*$",
        r"(?i)Please visit.*$",
        r"(?i)Click here.*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Accepted date layouts, day-first where the layout is ambiguous.
const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%Y-%m-%d",
    "%d/%m/%y",
];

/// Normalize a raw record into a [`Tender`], or reject it.
pub fn clean_record(raw: &RawRecord) -> Result<Tender> {
    let id = clean_tender_id(raw.tender_id.as_deref().unwrap_or(""))?;

    let title = normalize_text(raw.title.as_deref().unwrap_or(""));
    // The description falls back to the title when the source has none.
    let description_source = raw
        .description
        .as_deref()
        .or(raw.title.as_deref())
        .unwrap_or("");

    Ok(Tender {
        id,
        tender_type: TenderType::classify(raw.tender_type.as_deref().unwrap_or("")),
        title,
        organization: normalize_text(raw.organization.as_deref().unwrap_or("")),
        // Publish dates fall back to today; closing dates stay empty.
        publish_date: parse_date(raw.publish_date.as_deref())
            .unwrap_or_else(|| Utc::now().date_naive()),
        closing_date: parse_date(raw.closing_date.as_deref()),
        description: clean_description(description_source),
        source_url: raw.source_url.clone(),
        attachments: extract_attachments(raw.attachments.as_ref()),
        raw_snippet: raw.raw_snippet.as_deref().map(truncate_snippet),
        ingested_at: Utc::now(),
    })
}

/// Trim the id and reject empty or sentinel values.
fn clean_tender_id(raw: &str) -> Result<String> {
    let cleaned = raw.trim();
    if cleaned.is_empty() || cleaned == UNKNOWN_ID_SENTINEL {
        return Err(TenderScrapeError::validation(format!(
            "invalid tender id {raw:?}"
        )));
    }
    Ok(cleaned.to_string())
}

/// Collapse whitespace runs and trim.
fn normalize_text(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Normalize, then strip any trailing boilerplate phrase.
fn clean_description(text: &str) -> String {
    let mut desc = normalize_text(text);
    for pattern in BOILERPLATE_RES.iter() {
        if let Some(start) = pattern.find(&desc).map(|m| m.start()) {
            desc.truncate(start);
        }
    }
    desc.trim_end().to_string()
}

/// Parse a raw date, day-first, after dropping any trailing time
/// component. Empty or unparseable input yields `None`; the caller
/// decides the per-field default.
fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let stripped = TRAILING_TIME_RE.replace(raw, "");
    let candidate = stripped.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(candidate, format) {
            return Some(date);
        }
    }

    warn!(raw, "unparseable date");
    None
}

/// Coerce the raw attachments value into a list of non-empty strings.
fn extract_attachments(raw: Option<&serde_json::Value>) -> Vec<String> {
    match raw {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::String(s)) => {
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s.clone()]
            }
        }
        Some(serde_json::Value::Array(items)) => {
            items.iter().filter_map(attachment_text).collect()
        }
        Some(_) => Vec::new(),
    }
}

/// Stringify one attachment element, dropping empty/zero/false values.
fn attachment_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null | serde_json::Value::Bool(false) => None,
        serde_json::Value::Bool(true) => Some("true".to_string()),
        serde_json::Value::Number(n) => {
            (n.as_f64() != Some(0.0)).then(|| n.to_string())
        }
        serde_json::Value::String(s) => (!s.is_empty()).then(|| s.clone()),
        serde_json::Value::Array(a) => (!a.is_empty()).then(|| value.to_string()),
        serde_json::Value::Object(o) => (!o.is_empty()).then(|| value.to_string()),
    }
}

/// Bound the markup excerpt to [`MAX_SNIPPET_CHARS`] characters.
fn truncate_snippet(snippet: &str) -> String {
    if snippet.chars().count() <= MAX_SNIPPET_CHARS {
        snippet.to_string()
    } else {
        snippet.chars().take(MAX_SNIPPET_CHARS).collect()
    }
}
