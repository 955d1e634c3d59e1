//! In-memory [`KnowledgeStore`] for tests and embedding.
//!
//! Ingestion reads the file as (lossy) UTF-8 and keeps it in a `Vec`
//! behind `std::sync::RwLock`. Queries return the stored document sharing
//! the most terms with the query, or the no-results sentinel sentence.
//! Fixed answers and injected failures make handler behaviour deterministic.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{IngestError, KnowledgeStore, QueryError, NO_RESULTS_ANSWER};
use crate::models::{Answer, IngestSummary};

struct StoredDoc {
    source: PathBuf,
    text: String,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<Vec<StoredDoc>>,
    fixed_answer: Option<String>,
    ingest_failure: Option<String>,
    query_failure: Option<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query returns `answer` verbatim.
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.fixed_answer = Some(answer.into());
        self
    }

    /// Every ingest fails with [`IngestError::Store`].
    pub fn with_ingest_failure(mut self, message: impl Into<String>) -> Self {
        self.ingest_failure = Some(message.into());
        self
    }

    /// Every query fails with [`QueryError::Store`].
    pub fn with_query_failure(mut self, message: impl Into<String>) -> Self {
        self.query_failure = Some(message.into());
        self
    }

    /// Paths passed to [`KnowledgeStore::ingest`], in call order. Failed
    /// ingests are included.
    pub fn ingested_paths(&self) -> Vec<PathBuf> {
        self.docs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|d| d.source.clone())
            .collect()
    }

    /// Number of documents held.
    pub fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn ingest(&self, path: &Path) -> Result<IngestSummary, IngestError> {
        let bytes = std::fs::read(path).map_err(|source| IngestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        self.docs.write().unwrap_or_else(PoisonError::into_inner).push(StoredDoc {
            source: path.to_path_buf(),
            text,
        });

        if let Some(message) = &self.ingest_failure {
            return Err(IngestError::Store(message.clone()));
        }

        Ok(IngestSummary {
            source: path.display().to_string(),
            documents: 1,
            chunks: 1,
            detail: None,
        })
    }

    async fn query(&self, text: &str) -> Result<Answer, QueryError> {
        if let Some(message) = &self.query_failure {
            return Err(QueryError::Store(message.clone()));
        }
        if let Some(answer) = &self.fixed_answer {
            return Ok(Answer::new(answer.clone()));
        }

        let query_lower = text.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        let best = docs
            .iter()
            .map(|d| {
                let lower = d.text.to_lowercase();
                let hits = terms.iter().filter(|t| lower.contains(*t)).count();
                (hits, d)
            })
            .filter(|(hits, _)| *hits > 0)
            .max_by_key(|(hits, _)| *hits);

        Ok(match best {
            Some((_, doc)) => Answer::new(doc.text.trim()),
            None => Answer::new(NO_RESULTS_ANSWER),
        })
    }
}
