//! The loosely-shaped extraction boundary between parser and cleaner.

/// One unvalidated record extracted from a listing document.
///
/// Fields are explicit options rather than a free-form map: the two source
/// shapes (HTML table rows, JSON items with fallback key names) drift, so
/// anything may be absent. Instances live only for the hop from parser to
/// cleaner and are never persisted.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    /// Portal identifier text, when extractable.
    pub tender_id: Option<String>,
    /// Listing title text.
    pub title: Option<String>,
    /// Issuing organization text.
    pub organization: Option<String>,
    /// Free-form type text (classified later).
    pub tender_type: Option<String>,
    /// Publish date as written by the source.
    pub publish_date: Option<String>,
    /// Closing date as written by the source.
    pub closing_date: Option<String>,
    /// Description text, when the source carries one.
    pub description: Option<String>,
    /// Absolute URL of the tender detail page.
    pub source_url: String,
    /// Attachment data in whatever shape the source used.
    pub attachments: Option<serde_json::Value>,
    /// Originating markup, untruncated (bounded during cleaning).
    pub raw_snippet: Option<String>,
}
