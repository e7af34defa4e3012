//! Schema creation for the evidence store.
//!
//! Three tables: `queries` owns `documents` and `summaries` through
//! `ON DELETE CASCADE` foreign keys. Every statement is idempotent, so
//! `rdigest init` can be re-run safely.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an open pool.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queries (
            id TEXT PRIMARY KEY,
            query_text TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            query_id TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT 'Unknown',
            url TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            fetched_at INTEGER NOT NULL,
            FOREIGN KEY (query_id) REFERENCES queries(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summaries (
            id TEXT PRIMARY KEY,
            query_id TEXT NOT NULL,
            summary_text TEXT NOT NULL,
            summary_class TEXT NOT NULL DEFAULT 'medium',
            created_at INTEGER NOT NULL,
            FOREIGN KEY (query_id) REFERENCES queries(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_queries_text ON queries(query_text)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_query ON documents(query_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_summaries_query_class ON summaries(query_id, summary_class)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
