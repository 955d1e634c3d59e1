//! Data types exchanged between the chat client, the HTTP routes and the
//! knowledge store.

use serde::{Deserialize, Serialize};

/// A single turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// Result of a store query. `answer` may be absent; callers treat that as
/// an empty answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub answer: Option<String>,
}

impl Answer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            answer: Some(text.into()),
        }
    }

    /// The answer text, or `""` when the store returned none.
    pub fn text(&self) -> &str {
        self.answer.as_deref().unwrap_or("")
    }
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Path or label of the ingested input.
    pub source: String,
    /// Documents written (0 when the store does not report it).
    pub documents: u64,
    /// Chunks written (0 when the store does not report it).
    pub chunks: u64,
    /// Free-form diagnostics, e.g. the external tool's stdout.
    #[serde(default)]
    pub detail: Option<String>,
}
