//! Built-in [`KnowledgeStore`] over a single SQLite file.
//!
//! Documents are extracted ([`crate::extract`]), chunked
//! ([`crate::chunk`]) and indexed in an FTS5 table. Queries run an FTS5
//! OR-match over the query's terms and answer with the best-ranked chunks
//! verbatim. There is no embedding or language model here; use the command
//! backend for synthesised answers.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use docchat_core::models::{Answer, IngestSummary};
use docchat_core::store::{IngestError, KnowledgeStore, QueryError, NO_RESULTS_ANSWER};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::db;
use crate::extract::{extract_text, DocumentKind};
use crate::migrate;
use crate::upload::original_name;

pub struct SqliteStore {
    pool: SqlitePool,
    max_tokens: usize,
    final_limit: i64,
    upload_prefix: String,
}

impl SqliteStore {
    /// Opens (creating if needed) the store file named by `config.store.path`.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.store.path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            max_tokens: config.chunking.max_tokens,
            final_limit: config.retrieval.final_limit,
            upload_prefix: config.server.upload_prefix.clone(),
        })
    }

    /// Number of indexed documents.
    pub async fn document_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn write_document(
        &self,
        name: &str,
        kind: DocumentKind,
        content_hash: &str,
        chunks: &[String],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // First statement is a write, so the write lock is held from the start.
        // Re-ingesting identical content keeps the document id.
        let now = chrono::Utc::now().timestamp();
        let doc_id: String = sqlx::query_scalar(
            r#"
            INSERT INTO documents (id, name, content_type, content_hash, ingested_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(content_hash) DO UPDATE SET
                name = excluded.name,
                ingested_at = excluded.ingested_at
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(kind.content_type())
        .bind(content_hash)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM chunks_fts WHERE document_id = ?")
            .bind(&doc_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(&doc_id)
            .execute(&mut *tx)
            .await?;

        for (index, text) in chunks.iter().enumerate() {
            let chunk_id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO chunks (id, document_id, chunk_index, text) VALUES (?, ?, ?, ?)",
            )
            .bind(&chunk_id)
            .bind(&doc_id)
            .bind(index as i64)
            .bind(text)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunks_fts (chunk_id, document_id, text) VALUES (?, ?, ?)")
                .bind(&chunk_id)
                .bind(&doc_id)
                .bind(text)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await
    }
}

/// Builds an FTS5 expression matching any alphanumeric term of `query`.
/// Terms are quoted so FTS5 operators in user input are inert.
fn fts_match_expression(query: &str) -> Option<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
    {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn ingest(&self, path: &Path) -> Result<IngestSummary, IngestError> {
        let kind = DocumentKind::from_path(path)
            .ok_or_else(|| IngestError::Unsupported(path.display().to_string()))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| IngestError::Read {
                path: path.display().to_string(),
                source,
            })?;

        let text = tokio::task::spawn_blocking(move || extract_text(&bytes, kind))
            .await
            .map_err(|e| IngestError::Extraction(e.to_string()))??;
        if text.trim().is_empty() {
            return Err(IngestError::Extraction(format!(
                "no text found in {}",
                path.display()
            )));
        }

        let content_hash = format!("{:x}", Sha256::digest(text.as_bytes()));
        let chunks = chunk_text(&text, self.max_tokens);
        let name = match path.file_name() {
            Some(file_name) => {
                original_name(&file_name.to_string_lossy(), &self.upload_prefix).to_string()
            }
            None => path.display().to_string(),
        };

        self.write_document(&name, kind, &content_hash, &chunks)
            .await
            .map_err(|e| IngestError::Store(e.to_string()))?;

        tracing::debug!(document = %name, chunks = chunks.len(), "indexed document");

        Ok(IngestSummary {
            source: path.display().to_string(),
            documents: 1,
            chunks: chunks.len() as u64,
            detail: None,
        })
    }

    async fn query(&self, text: &str) -> Result<Answer, QueryError> {
        let Some(expression) = fts_match_expression(text) else {
            return Ok(Answer::new(NO_RESULTS_ANSWER));
        };

        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT c.text
            FROM chunks_fts
            JOIN chunks c ON c.id = chunks_fts.chunk_id
            WHERE chunks_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(&expression)
        .bind(self.final_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QueryError::Store(e.to_string()))?;

        if rows.is_empty() {
            return Ok(Answer::new(NO_RESULTS_ANSWER));
        }
        Ok(Answer::new(rows.join("\n\n")))
    }
}
