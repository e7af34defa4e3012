//! Storage abstraction for queries, evidence documents, and summaries.
//!
//! The [`EvidenceStore`] trait is what the pipeline and the HTTP server
//! depend on. Two backends implement it:
//!
//! - [`sqlite::SqliteStore`] for the `rdigest` binary and server.
//! - [`memory::InMemoryStore`] for tests and embedding in other programs.
//!
//! Ownership rule: every document and summary belongs to exactly one query,
//! and deleting the query deletes them. Neither backend lets a document or
//! summary be inserted for a query that does not exist.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EvidenceDocument, FetchedDocument, LengthClass, Query, QueryRecord, Summary};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_query`](EvidenceStore::create_query) | Insert a new query row |
/// | [`find_query`](EvidenceStore::find_query) | Exact text lookup (newest match) |
/// | [`latest_summary`](EvidenceStore::latest_summary) | Newest summary of a class |
/// | [`insert_documents`](EvidenceStore::insert_documents) | Batch insert, all-or-nothing |
/// | [`documents_for`](EvidenceStore::documents_for) | Documents in insertion order |
/// | [`insert_summary`](EvidenceStore::insert_summary) | Persist one summary |
/// | [`get_query`](EvidenceStore::get_query) | Query with documents and summaries |
/// | [`list_queries`](EvidenceStore::list_queries) | All queries, newest first |
/// | [`delete_query`](EvidenceStore::delete_query) | Cascading delete |
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn create_query(&self, query_text: &str) -> Result<Query>;

    async fn find_query(&self, query_text: &str) -> Result<Option<Query>>;

    async fn latest_summary(&self, query_id: &str, class: LengthClass) -> Result<Option<Summary>>;

    async fn insert_documents(
        &self,
        query_id: &str,
        docs: &[FetchedDocument],
    ) -> Result<Vec<EvidenceDocument>>;

    async fn documents_for(&self, query_id: &str) -> Result<Vec<EvidenceDocument>>;

    async fn insert_summary(
        &self,
        query_id: &str,
        summary_text: &str,
        class: LengthClass,
    ) -> Result<Summary>;

    async fn get_query(&self, id: &str) -> Result<Option<QueryRecord>>;

    async fn list_queries(&self, limit: Option<usize>) -> Result<Vec<QueryRecord>>;

    /// Returns `false` when no query had that id.
    async fn delete_query(&self, id: &str) -> Result<bool>;
}

pub(crate) fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
