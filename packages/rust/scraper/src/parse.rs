//! Extraction of raw tender records from listing documents.
//!
//! Parsing never fails the pipeline: structural mismatches degrade to an
//! empty or partial result with a warning, and per-row/per-item problems
//! are logged and skipped.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::record::RawRecord;

/// Matches tender detail links and captures the numeric identifier.
static TENDER_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/tender/(\d+)").expect("valid regex"));

/// Identifying table selectors, tried in priority order before falling
/// back to the first table in the document.
const TABLE_SELECTORS: &[&str] = &["table.dataTable", "table#tenderTable"];

/// Organization fallback for link-scanned records without a sibling cell.
const UNKNOWN_ORGANIZATION: &str = "Unknown Organization";

// ---------------------------------------------------------------------------
// Markup mode
// ---------------------------------------------------------------------------

/// Extract raw records from a listing HTML document.
///
/// Tries the listing table first; when no table yields records, falls back
/// to scanning the whole document for tender detail hyperlinks.
pub fn parse_listing_html(html: &str, base_url: &Url) -> Vec<RawRecord> {
    let doc = Html::parse_document(html);

    let records = match find_listing_table(&doc) {
        Some(table) => parse_table_rows(&table, base_url),
        None => {
            warn!("no listing table found in document");
            Vec::new()
        }
    };

    if records.is_empty() {
        let scanned = scan_tender_links(&doc, base_url);
        if scanned.is_empty() {
            warn!("no tender rows or links extracted from document");
        } else {
            info!(count = scanned.len(), "extracted records via link scan");
        }
        return scanned;
    }

    info!(count = records.len(), "parsed records from listing table");
    records
}

/// Locate the primary listing table.
fn find_listing_table<'a>(doc: &'a Html) -> Option<ElementRef<'a>> {
    for selector in TABLE_SELECTORS {
        let sel = Selector::parse(selector).unwrap();
        if let Some(table) = doc.select(&sel).next() {
            return Some(table);
        }
    }
    let any_table = Selector::parse("table").unwrap();
    doc.select(&any_table).next()
}

/// Extract one record per qualifying table row.
fn parse_table_rows(table: &ElementRef<'_>, base_url: &Url) -> Vec<RawRecord> {
    let tr_sel = Selector::parse("tr").unwrap();
    let td_sel = Selector::parse("td").unwrap();

    let rows: Vec<_> = table.select(&tr_sel).collect();
    // The first row is a header when anything follows it.
    let body = if rows.len() > 1 { &rows[1..] } else { &rows[..] };

    let mut records = Vec::new();
    for row in body {
        let cells: Vec<_> = row.select(&td_sel).collect();
        if cells.len() < 3 {
            continue;
        }

        // The detail link (and thus the id) must sit in the first 3 cells.
        let Some((id, href, title)) = cells.iter().take(3).find_map(find_tender_link) else {
            debug!("row has no tender detail link, skipping");
            continue;
        };

        let source_url = match base_url.join(&href) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!(href = %href, error = %e, "unresolvable tender link, skipping row");
                continue;
            }
        };

        records.push(RawRecord {
            tender_id: Some(id),
            title: (!title.is_empty()).then_some(title),
            organization: cells.get(1).map(element_text),
            tender_type: cells.get(2).map(element_text),
            publish_date: cells.get(3).map(element_text),
            closing_date: cells.get(4).map(element_text),
            description: None,
            source_url,
            attachments: None,
            raw_snippet: Some(row.html()),
        });
    }
    records
}

/// Find a tender detail link inside an element. Returns (id, href, text).
fn find_tender_link(cell: &ElementRef<'_>) -> Option<(String, String, String)> {
    let a_sel = Selector::parse("a[href]").unwrap();
    cell.select(&a_sel).find_map(|link| {
        let href = link.value().attr("href")?;
        let caps = TENDER_LINK_RE.captures(href)?;
        Some((caps[1].to_string(), href.to_string(), element_text(&link)))
    })
}

/// Fallback: every tender detail hyperlink in the document becomes one
/// record, recovering organization/type from the enclosing row if any.
fn scan_tender_links(doc: &Html, base_url: &Url) -> Vec<RawRecord> {
    let a_sel = Selector::parse("a[href]").unwrap();
    let td_sel = Selector::parse("td").unwrap();

    let mut records = Vec::new();
    for link in doc.select(&a_sel) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(caps) = TENDER_LINK_RE.captures(href) else {
            continue;
        };
        let id = caps[1].to_string();

        let source_url = match base_url.join(href) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!(href = %href, error = %e, "unresolvable tender link, skipping");
                continue;
            }
        };

        let enclosing_row = link
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "tr");

        let (organization, tender_type, snippet) = match enclosing_row {
            Some(row) => {
                let cells: Vec<_> = row.select(&td_sel).collect();
                (
                    cells.get(1).map(element_text),
                    cells.get(2).map(element_text),
                    row.html(),
                )
            }
            None => (None, None, link.html()),
        };

        let title = element_text(&link);
        records.push(RawRecord {
            tender_id: Some(id),
            title: (!title.is_empty()).then_some(title),
            organization: organization
                .filter(|s| !s.is_empty())
                .or_else(|| Some(UNKNOWN_ORGANIZATION.to_string())),
            tender_type: tender_type
                .filter(|s| !s.is_empty())
                .or_else(|| Some("Works".to_string())),
            publish_date: None,
            closing_date: None,
            description: None,
            source_url,
            attachments: None,
            raw_snippet: Some(snippet),
        });
    }
    records
}

/// Collect and trim an element's text content.
fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

// ---------------------------------------------------------------------------
// Structured-data mode
// ---------------------------------------------------------------------------

/// Extract raw records from a JSON listing body: either a bare array or an
/// object carrying the array under `data`.
pub fn parse_listing_json(body: &serde_json::Value, base_url: &Url) -> Vec<RawRecord> {
    let items = match body {
        serde_json::Value::Array(items) => items.as_slice(),
        serde_json::Value::Object(map) => match map.get("data").and_then(|v| v.as_array()) {
            Some(items) => items.as_slice(),
            None => {
                warn!("unexpected JSON listing shape: object without a data array");
                return Vec::new();
            }
        },
        _ => {
            warn!("unexpected JSON listing shape: neither array nor object");
            return Vec::new();
        }
    };

    let records: Vec<RawRecord> = items
        .iter()
        .map(|item| raw_record_from_item(item, base_url))
        .collect();

    info!(count = records.len(), "parsed records from JSON listing");
    records
}

/// Build a raw record from one JSON item, reading each field under its
/// primary key with a fallback alternate. Items without a usable id still
/// yield a record; the cleaner rejects and counts them.
fn raw_record_from_item(item: &serde_json::Value, base_url: &Url) -> RawRecord {
    let id = text_field(item, "id", "tenderId");
    if id.is_none() {
        debug!("listing item has no usable identifier");
    }

    let source_url = base_url
        .join(&format!("/tender/{}", id.as_deref().unwrap_or("")))
        .map(|u| u.to_string())
        .unwrap_or_default();

    RawRecord {
        tender_id: id,
        title: text_field(item, "title", "tenderTitle"),
        organization: text_field(item, "organization", "organizationName"),
        tender_type: text_field(item, "type", "evaluationType"),
        publish_date: text_field(item, "publishDate", "bidSubmissionStartDate"),
        closing_date: text_field(item, "closingDate", "bidSubmissionEndDate"),
        description: text_field(item, "description", "tenderDescription"),
        source_url,
        attachments: item.get("attachments").cloned(),
        raw_snippet: None,
    }
}

/// Read a string-or-number field under `primary`, falling back to `fallback`.
fn text_field(item: &serde_json::Value, primary: &str, fallback: &str) -> Option<String> {
    let value = item.get(primary).or_else(|| item.get(fallback))?;
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://tenders.example.gov").unwrap()
    }

    const LISTING_TABLE: &str = r#"<html><body>
        <table class="dataTable">
          <tr><th>Title</th><th>Organization</th><th>Type</th><th>Published</th><th>Closing</th></tr>
          <tr>
            <td><a href="/tender/101">Road resurfacing, Phase II</a></td>
            <td>Roads Department</td>
            <td>Works</td>
            <td>03/04/2024</td>
            <td>20/04/2024</td>
          </tr>
          <tr>
            <td><a href="/tender/102">Laboratory reagents</a></td>
            <td>Health Department</td>
            <td>Goods</td>
            <td>05/04/2024</td>
            <td>25/04/2024</td>
          </tr>
        </table>
        </body></html>"#;

    #[test]
    fn table_rows_map_cells_by_position() {
        let records = parse_listing_html(LISTING_TABLE, &base());
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.tender_id.as_deref(), Some("101"));
        assert_eq!(first.title.as_deref(), Some("Road resurfacing, Phase II"));
        assert_eq!(first.organization.as_deref(), Some("Roads Department"));
        assert_eq!(first.tender_type.as_deref(), Some("Works"));
        assert_eq!(first.publish_date.as_deref(), Some("03/04/2024"));
        assert_eq!(first.closing_date.as_deref(), Some("20/04/2024"));
        assert_eq!(
            first.source_url,
            "https://tenders.example.gov/tender/101"
        );
        assert!(first.raw_snippet.as_deref().unwrap().contains("tender/101"));

        assert_eq!(records[1].tender_id.as_deref(), Some("102"));
    }

    #[test]
    fn source_order_is_preserved() {
        let records = parse_listing_html(LISTING_TABLE, &base());
        let ids: Vec<_> = records.iter().filter_map(|r| r.tender_id.as_deref()).collect();
        assert_eq!(ids, vec!["101", "102"]);
    }

    #[test]
    fn rows_without_enough_cells_or_links_are_skipped() {
        let html = r#"<table class="dataTable">
          <tr><th>h</th></tr>
          <tr><td>only</td><td>two</td></tr>
          <tr><td>no link</td><td>Org</td><td>Works</td></tr>
          <tr><td><a href="/tender/7">Valid row</a></td><td>Org</td><td>Goods</td></tr>
        </table>"#;
        let records = parse_listing_html(html, &base());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tender_id.as_deref(), Some("7"));
    }

    #[test]
    fn first_table_is_used_when_no_identifying_attribute_matches() {
        let html = r#"<table>
          <tr><th>h</th><th>h</th><th>h</th></tr>
          <tr><td><a href="/tender/33">Plain table row</a></td><td>Org A</td><td>Services</td></tr>
        </table>"#;
        let records = parse_listing_html(html, &base());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tender_type.as_deref(), Some("Services"));
    }

    #[test]
    fn link_scan_recovers_sibling_cells() {
        // The detail link sits in the fourth cell, so the table method
        // yields nothing and the link scan recovers organization/type
        // from the enclosing row.
        let html = r#"<table>
          <tr>
            <td>Bridge repair</td>
            <td>Bridges Authority</td>
            <td>Services</td>
            <td><a href="/tender/55">details</a></td>
          </tr>
        </table>
        <div><a href="/tender/56">Water supply scheme</a></div>"#;
        let records = parse_listing_html(html, &base());
        assert_eq!(records.len(), 2);

        let in_row = &records[0];
        assert_eq!(in_row.tender_id.as_deref(), Some("55"));
        assert_eq!(in_row.organization.as_deref(), Some("Bridges Authority"));
        assert_eq!(in_row.tender_type.as_deref(), Some("Services"));

        let bare = &records[1];
        assert_eq!(bare.tender_id.as_deref(), Some("56"));
        assert_eq!(bare.title.as_deref(), Some("Water supply scheme"));
        // No enclosing row: sentinel defaults apply.
        assert_eq!(bare.organization.as_deref(), Some("Unknown Organization"));
        assert_eq!(bare.tender_type.as_deref(), Some("Works"));
    }

    #[test]
    fn non_tender_links_are_ignored() {
        let html = r#"<a href="/about">About</a>
            <a href="/tender/abc">Non-numeric</a>
            <a href="/tender/90">Real</a>"#;
        let records = parse_listing_html(html, &base());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tender_id.as_deref(), Some("90"));
    }

    #[test]
    fn empty_document_yields_nothing() {
        let records = parse_listing_html("<html><body><p>maintenance</p></body></html>", &base());
        assert!(records.is_empty());
    }

    #[test]
    fn json_bare_array_with_primary_keys() {
        let body = serde_json::json!([
            {
                "id": "201",
                "title": "Street lighting",
                "organization": "Urban Development",
                "type": "Goods",
                "publishDate": "01/03/2024",
                "closingDate": "15/03/2024",
                "description": "LED street lighting procurement",
                "attachments": ["spec.pdf"]
            }
        ]);
        let records = parse_listing_json(&body, &base());
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.tender_id.as_deref(), Some("201"));
        assert_eq!(r.organization.as_deref(), Some("Urban Development"));
        assert_eq!(r.source_url, "https://tenders.example.gov/tender/201");
        assert!(r.attachments.is_some());
    }

    #[test]
    fn json_data_wrapper_and_fallback_keys() {
        let body = serde_json::json!({
            "data": [
                {
                    "tenderId": 202,
                    "tenderTitle": "Canal desilting",
                    "organizationName": "Irrigation Department",
                    "evaluationType": "Works",
                    "bidSubmissionStartDate": "02/03/2024",
                    "bidSubmissionEndDate": "18/03/2024",
                    "tenderDescription": "Desilting of main canal"
                }
            ]
        });
        let records = parse_listing_json(&body, &base());
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.tender_id.as_deref(), Some("202"));
        assert_eq!(r.title.as_deref(), Some("Canal desilting"));
        assert_eq!(r.organization.as_deref(), Some("Irrigation Department"));
        assert_eq!(r.tender_type.as_deref(), Some("Works"));
        assert_eq!(r.publish_date.as_deref(), Some("02/03/2024"));
        assert_eq!(r.closing_date.as_deref(), Some("18/03/2024"));
        assert_eq!(r.description.as_deref(), Some("Desilting of main canal"));
    }

    #[test]
    fn json_unexpected_shapes_degrade_to_empty() {
        assert!(parse_listing_json(&serde_json::json!({"total": 0}), &base()).is_empty());
        assert!(parse_listing_json(&serde_json::json!("nope"), &base()).is_empty());
        assert!(parse_listing_json(&serde_json::json!(42), &base()).is_empty());
    }

    #[test]
    fn json_item_without_id_still_yields_a_record_for_the_cleaner() {
        let body = serde_json::json!([{"title": "Orphan item"}]);
        let records = parse_listing_json(&body, &base());
        assert_eq!(records.len(), 1);
        assert!(records[0].tender_id.is_none());
    }
}
