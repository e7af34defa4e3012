//! Core data models.
//!
//! A [`Query`] owns its [`EvidenceDocument`]s and [`Summary`] rows. Provider
//! adapters produce [`FetchedDocument`]s, which become evidence documents
//! once persisted. [`QueryRecord`] is the serialized shape returned by the
//! HTTP API and the CLI's `--json` output.

use serde::Serialize;

/// A research query. Identity is the exact submitted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub id: String,
    pub query_text: String,
    pub created_at: i64,
}

/// A persisted evidence document, owned by exactly one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceDocument {
    pub id: String,
    pub query_id: String,
    pub source: String,
    pub url: String,
    pub content: String,
    pub fetched_at: i64,
}

/// A persisted summary, owned by exactly one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub id: String,
    pub query_id: String,
    pub summary_text: String,
    pub summary_class: LengthClass,
    pub created_at: i64,
}

/// Normalized provider output, before it is attached to a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub source: String,
    pub url: String,
    pub content: String,
}

impl FetchedDocument {
    /// Build a document from optional provider fields. A missing or blank
    /// title becomes `"Unknown"`; missing url/content become empty strings.
    pub fn normalized(source: Option<String>, url: Option<String>, content: Option<String>) -> Self {
        let source = source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        Self {
            source,
            url: url.unwrap_or_default(),
            content: content.unwrap_or_default(),
        }
    }
}

/// Summary length class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthClass {
    Short,
    Medium,
    Long,
}

impl LengthClass {
    /// Parse a user-supplied label. Unknown labels map to `Medium`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "short" => LengthClass::Short,
            "long" => LengthClass::Long,
            _ => LengthClass::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LengthClass::Short => "short",
            LengthClass::Medium => "medium",
            LengthClass::Long => "long",
        }
    }
}

impl Default for LengthClass {
    fn default() -> Self {
        LengthClass::Medium
    }
}

impl std::fmt::Display for LengthClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query with its documents and summaries, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    pub id: String,
    pub query_text: String,
    pub created_at: String,
    pub documents: Vec<DocumentRecord>,
    pub summaries: Vec<SummaryRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub source: String,
    pub url: String,
    pub content: String,
    pub fetched_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub id: String,
    pub summary_text: String,
    pub summary_class: LengthClass,
    pub created_at: String,
}

impl QueryRecord {
    pub fn assemble(query: Query, documents: Vec<EvidenceDocument>, summaries: Vec<Summary>) -> Self {
        Self {
            id: query.id,
            query_text: query.query_text,
            created_at: format_ts_iso(query.created_at),
            documents: documents
                .into_iter()
                .map(|d| DocumentRecord {
                    id: d.id,
                    source: d.source,
                    url: d.url,
                    content: d.content,
                    fetched_at: format_ts_iso(d.fetched_at),
                })
                .collect(),
            summaries: summaries
                .into_iter()
                .map(|s| SummaryRecord {
                    id: s.id,
                    summary_text: s.summary_text,
                    summary_class: s.summary_class,
                    created_at: format_ts_iso(s.created_at),
                })
                .collect(),
        }
    }
}

pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
