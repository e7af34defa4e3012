//! SQLite-backed [`EvidenceStore`].
//!
//! Document batches are written in one transaction, so a failed batch
//! leaves no partial evidence behind. Reads return documents in insertion
//! order (`rowid`), which is the order the winning provider returned them.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::models::{EvidenceDocument, FetchedDocument, LengthClass, Query, QueryRecord, Summary};

use super::{new_id, now_ts, EvidenceStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn summaries_for(&self, query_id: &str) -> Result<Vec<Summary>> {
        let rows = sqlx::query(
            "SELECT id, query_id, summary_text, summary_class, created_at FROM summaries WHERE query_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(query_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(summary_from_row).collect())
    }

    async fn record_for(&self, query: Query) -> Result<QueryRecord> {
        let docs = self.documents_for(&query.id).await?;
        let summaries = self.summaries_for(&query.id).await?;
        Ok(QueryRecord::assemble(query, docs, summaries))
    }
}

fn query_from_row(row: &SqliteRow) -> Query {
    Query {
        id: row.get("id"),
        query_text: row.get("query_text"),
        created_at: row.get("created_at"),
    }
}

fn document_from_row(row: &SqliteRow) -> EvidenceDocument {
    EvidenceDocument {
        id: row.get("id"),
        query_id: row.get("query_id"),
        source: row.get("source"),
        url: row.get("url"),
        content: row.get("content"),
        fetched_at: row.get("fetched_at"),
    }
}

fn summary_from_row(row: &SqliteRow) -> Summary {
    let class: String = row.get("summary_class");
    Summary {
        id: row.get("id"),
        query_id: row.get("query_id"),
        summary_text: row.get("summary_text"),
        summary_class: LengthClass::from_label(&class),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl EvidenceStore for SqliteStore {
    async fn create_query(&self, query_text: &str) -> Result<Query> {
        let query = Query {
            id: new_id(),
            query_text: query_text.to_string(),
            created_at: now_ts(),
        };
        sqlx::query("INSERT INTO queries (id, query_text, created_at) VALUES (?, ?, ?)")
            .bind(&query.id)
            .bind(&query.query_text)
            .bind(query.created_at)
            .execute(&self.pool)
            .await?;
        Ok(query)
    }

    async fn find_query(&self, query_text: &str) -> Result<Option<Query>> {
        let row = sqlx::query(
            "SELECT id, query_text, created_at FROM queries WHERE query_text = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(query_text)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(query_from_row))
    }

    async fn latest_summary(&self, query_id: &str, class: LengthClass) -> Result<Option<Summary>> {
        let row = sqlx::query(
            r#"
            SELECT id, query_id, summary_text, summary_class, created_at
            FROM summaries
            WHERE query_id = ? AND summary_class = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(query_id)
        .bind(class.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(summary_from_row))
    }

    async fn insert_documents(
        &self,
        query_id: &str,
        docs: &[FetchedDocument],
    ) -> Result<Vec<EvidenceDocument>> {
        let now = now_ts();
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(docs.len());

        for doc in docs {
            let row = EvidenceDocument {
                id: new_id(),
                query_id: query_id.to_string(),
                source: doc.source.clone(),
                url: doc.url.clone(),
                content: doc.content.clone(),
                fetched_at: now,
            };
            sqlx::query(
                r#"
                INSERT INTO documents (id, query_id, source, url, content, fetched_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.id)
            .bind(&row.query_id)
            .bind(&row.source)
            .bind(&row.url)
            .bind(&row.content)
            .bind(row.fetched_at)
            .execute(&mut *tx)
            .await?;
            inserted.push(row);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn documents_for(&self, query_id: &str) -> Result<Vec<EvidenceDocument>> {
        let rows = sqlx::query(
            "SELECT id, query_id, source, url, content, fetched_at FROM documents WHERE query_id = ? ORDER BY rowid ASC",
        )
        .bind(query_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(document_from_row).collect())
    }

    async fn insert_summary(
        &self,
        query_id: &str,
        summary_text: &str,
        class: LengthClass,
    ) -> Result<Summary> {
        let summary = Summary {
            id: new_id(),
            query_id: query_id.to_string(),
            summary_text: summary_text.to_string(),
            summary_class: class,
            created_at: now_ts(),
        };
        sqlx::query(
            "INSERT INTO summaries (id, query_id, summary_text, summary_class, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&summary.id)
        .bind(&summary.query_id)
        .bind(&summary.summary_text)
        .bind(summary.summary_class.as_str())
        .bind(summary.created_at)
        .execute(&self.pool)
        .await?;
        Ok(summary)
    }

    async fn get_query(&self, id: &str) -> Result<Option<QueryRecord>> {
        let row = sqlx::query("SELECT id, query_text, created_at FROM queries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.record_for(query_from_row(&row)).await?)),
            None => Ok(None),
        }
    }

    async fn list_queries(&self, limit: Option<usize>) -> Result<Vec<QueryRecord>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(
            "SELECT id, query_text, created_at FROM queries ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(self.record_for(query_from_row(row)).await?);
        }
        Ok(records)
    }

    async fn delete_query(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM queries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
