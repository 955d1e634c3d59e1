//! Knowledge store capability.
//!
//! All retrieval, embedding and answer synthesis live behind the
//! [`KnowledgeStore`] trait. The server only ever calls
//! [`ingest`](KnowledgeStore::ingest) and [`query`](KnowledgeStore::query),
//! which keeps the HTTP routes testable with [`memory::InMemoryStore`].
//!
//! Implementations must be `Send + Sync` to be shared across request tasks.

pub mod memory;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Answer, IngestSummary};

/// Answer given by the built-in stores when retrieval finds nothing. It
/// contains [`NO_RESULTS_SENTINEL`](crate::answer::NO_RESULTS_SENTINEL).
pub const NO_RESULTS_ANSWER: &str = "No relevant information found.";

/// Failure of an external command run on behalf of a store.
#[derive(Debug, Error)]
pub enum CommandFailure {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("`{program}` exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Errors returned by [`KnowledgeStore::ingest`].
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported document type: {0}")]
    Unsupported(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error(transparent)]
    Command(#[from] CommandFailure),

    #[error("store error: {0}")]
    Store(String),
}

/// Errors returned by [`KnowledgeStore::query`].
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Command(#[from] CommandFailure),

    #[error("store error: {0}")]
    Store(String),
}

/// A single shared, file-backed knowledge store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ingest`](KnowledgeStore::ingest) | Extract, embed and add a document file |
/// | [`query`](KnowledgeStore::query) | Retrieve context and synthesise an answer |
///
/// # Example
///
/// ```rust
/// use docchat_core::store::KnowledgeStore;
/// use docchat_core::store::memory::InMemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryStore::new().with_answer("Forty-two.");
/// let answer = store.query("what is the answer?").await?;
/// assert_eq!(answer.text(), "Forty-two.");
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Adds the document at `path` to the store.
    ///
    /// The file is owned by the caller and may be deleted as soon as this
    /// returns.
    async fn ingest(&self, path: &Path) -> Result<IngestSummary, IngestError>;

    /// Answers `text` from the stored documents.
    async fn query(&self, text: &str) -> Result<Answer, QueryError>;
}
