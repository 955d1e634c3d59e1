//! Chat pipeline: store query → shaped answer → paced stream.
//!
//! The store produces the whole answer at once. [`stream_answer`] replays it
//! word by word through a bounded channel, pausing between words according
//! to a [`Pacing`] strategy. When the client goes away the receiving half is
//! dropped and the producer stops at its next send.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use docchat_core::answer::{finalize_answer, word_chunks};
use docchat_core::store::{KnowledgeStore, QueryError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

/// Chunks buffered ahead of a slow client.
const STREAM_BUFFER: usize = 16;

pub type ChunkStream = ReceiverStream<Result<Bytes, Infallible>>;

/// Delay strategy between streamed words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    None,
    Fixed(Duration),
}

impl Pacing {
    pub fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            Pacing::None
        } else {
            Pacing::Fixed(Duration::from_millis(ms))
        }
    }

    async fn pause(self) {
        if let Pacing::Fixed(delay) = self {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Queries `store` with `query` and returns the answer to deliver.
pub async fn answer_for(store: &dyn KnowledgeStore, query: &str) -> Result<String, QueryError> {
    let answer = store.query(query).await?;
    Ok(finalize_answer(&answer))
}

/// Streams `answer` as space-terminated words.
pub fn stream_answer(answer: &str, pacing: Pacing) -> ChunkStream {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    spawn_producer(word_chunks(answer), pacing, tx);
    ReceiverStream::new(rx)
}

/// Sends `chunks` in order; resolves to the number delivered before the
/// receiver closed.
fn spawn_producer(
    chunks: Vec<String>,
    pacing: Pacing,
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let total = chunks.len();
        for (sent, chunk) in chunks.into_iter().enumerate() {
            if tx.send(Ok(Bytes::from(chunk))).await.is_err() {
                tracing::debug!(sent, total, "client disconnected, stopping stream");
                return sent;
            }
            pacing.pause().await;
        }
        total
    })
}
