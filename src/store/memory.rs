//! In-memory [`EvidenceStore`] for tests and embedding.
//!
//! Rows live in `Vec`s behind `std::sync::RwLock`; insertion order doubles
//! as the tiebreak for "newest" when timestamps collide.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{EvidenceDocument, FetchedDocument, LengthClass, Query, QueryRecord, Summary};

use super::{new_id, now_ts, EvidenceStore};

#[derive(Default)]
struct Tables {
    queries: Vec<Query>,
    documents: Vec<EvidenceDocument>,
    summaries: Vec<Summary>,
}

impl Tables {
    fn has_query(&self, id: &str) -> bool {
        self.queries.iter().any(|q| q.id == id)
    }

    fn record(&self, query: &Query) -> QueryRecord {
        let docs = self
            .documents
            .iter()
            .filter(|d| d.query_id == query.id)
            .cloned()
            .collect();
        let summaries = self
            .summaries
            .iter()
            .filter(|s| s.query_id == query.id)
            .cloned()
            .collect();
        QueryRecord::assemble(query.clone(), docs, summaries)
    }
}

/// In-memory store. Cheap to construct; share it behind an `Arc`.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))
    }

    /// Number of stored queries (test helper).
    pub fn query_count(&self) -> usize {
        self.read().map(|t| t.queries.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EvidenceStore for InMemoryStore {
    async fn create_query(&self, query_text: &str) -> Result<Query> {
        let query = Query {
            id: new_id(),
            query_text: query_text.to_string(),
            created_at: now_ts(),
        };
        self.write()?.queries.push(query.clone());
        Ok(query)
    }

    async fn find_query(&self, query_text: &str) -> Result<Option<Query>> {
        let tables = self.read()?;
        Ok(tables
            .queries
            .iter()
            .rev()
            .find(|q| q.query_text == query_text)
            .cloned())
    }

    async fn latest_summary(&self, query_id: &str, class: LengthClass) -> Result<Option<Summary>> {
        let tables = self.read()?;
        Ok(tables
            .summaries
            .iter()
            .rev()
            .find(|s| s.query_id == query_id && s.summary_class == class)
            .cloned())
    }

    async fn insert_documents(
        &self,
        query_id: &str,
        docs: &[FetchedDocument],
    ) -> Result<Vec<EvidenceDocument>> {
        let mut tables = self.write()?;
        if !tables.has_query(query_id) {
            bail!("query not found: {}", query_id);
        }
        let now = now_ts();
        let inserted: Vec<EvidenceDocument> = docs
            .iter()
            .map(|d| EvidenceDocument {
                id: new_id(),
                query_id: query_id.to_string(),
                source: d.source.clone(),
                url: d.url.clone(),
                content: d.content.clone(),
                fetched_at: now,
            })
            .collect();
        tables.documents.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn documents_for(&self, query_id: &str) -> Result<Vec<EvidenceDocument>> {
        let tables = self.read()?;
        Ok(tables
            .documents
            .iter()
            .filter(|d| d.query_id == query_id)
            .cloned()
            .collect())
    }

    async fn insert_summary(
        &self,
        query_id: &str,
        summary_text: &str,
        class: LengthClass,
    ) -> Result<Summary> {
        let mut tables = self.write()?;
        if !tables.has_query(query_id) {
            bail!("query not found: {}", query_id);
        }
        let summary = Summary {
            id: new_id(),
            query_id: query_id.to_string(),
            summary_text: summary_text.to_string(),
            summary_class: class,
            created_at: now_ts(),
        };
        tables.summaries.push(summary.clone());
        Ok(summary)
    }

    async fn get_query(&self, id: &str) -> Result<Option<QueryRecord>> {
        let tables = self.read()?;
        Ok(tables
            .queries
            .iter()
            .find(|q| q.id == id)
            .map(|q| tables.record(q)))
    }

    async fn list_queries(&self, limit: Option<usize>) -> Result<Vec<QueryRecord>> {
        let tables = self.read()?;
        Ok(tables
            .queries
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .map(|q| tables.record(q))
            .collect())
    }

    async fn delete_query(&self, id: &str) -> Result<bool> {
        let mut tables = self.write()?;
        if !tables.has_query(id) {
            return Ok(false);
        }
        tables.queries.retain(|q| q.id != id);
        tables.documents.retain(|d| d.query_id != id);
        tables.summaries.retain(|s| s.query_id != id);
        Ok(true)
    }
}
