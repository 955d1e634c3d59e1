//! Answer shaping for the chat route.
//!
//! The store returns a complete answer string. Before delivery it is
//! post-processed ([`finalize_answer`]) and split into word chunks
//! ([`word_chunks`]) that the server paces out to emulate token streaming.

use thiserror::Error;

use crate::models::{Answer, ChatMessage};

/// Lower-case marker the store uses when retrieval found nothing.
pub const NO_RESULTS_SENTINEL: &str = "no relevant information found";

/// Delivered in place of any answer containing [`NO_RESULTS_SENTINEL`].
pub const GUIDANCE_MESSAGE: &str = "I couldn't find information about that in your uploaded documents. 📄\n\n\
Here's what you can do:\n\
• Upload documents using the 📎 attachment button below\n\
• Ask questions related to the documents you've already uploaded\n\
• Try rephrasing your question with different keywords\n\n\
Tip: I can answer questions about content from PDFs, documents, and files you share with me!";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryExtractError {
    #[error("messages must not be empty")]
    NoMessages,
}

/// Returns the content of the final message, which is the only turn sent
/// to the store.
pub fn last_query(messages: &[ChatMessage]) -> Result<&str, QueryExtractError> {
    messages
        .last()
        .map(|m| m.content.as_str())
        .ok_or(QueryExtractError::NoMessages)
}

/// Applies the "no results" substitution. A missing answer becomes `""`.
pub fn finalize_answer(answer: &Answer) -> String {
    let text = answer.text();
    if text.to_lowercase().contains(NO_RESULTS_SENTINEL) {
        GUIDANCE_MESSAGE.to_string()
    } else {
        text.to_string()
    }
}

/// Splits an answer on single spaces and appends one space to every piece.
///
/// Concatenating the chunks and removing the final space yields the input
/// exactly, including newlines and repeated spaces.
pub fn word_chunks(answer: &str) -> Vec<String> {
    answer.split(' ').map(|word| format!("{} ", word)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejoin(chunks: &[String]) -> String {
        let joined = chunks.concat();
        joined.strip_suffix(' ').unwrap_or(&joined).to_string()
    }

    #[test]
    fn last_query_uses_final_message_only() {
        let messages = vec![
            ChatMessage::user("first question"),
            ChatMessage::assistant("an answer"),
            ChatMessage::user("follow up"),
        ];
        assert_eq!(last_query(&messages), Ok("follow up"));
    }

    #[test]
    fn last_query_rejects_empty_history() {
        assert_eq!(last_query(&[]), Err(QueryExtractError::NoMessages));
    }

    #[test]
    fn sentinel_is_matched_case_insensitively() {
        for raw in [
            "No relevant information found.",
            "Sorry: NO RELEVANT INFORMATION FOUND in memory",
            "no relevant information found",
        ] {
            assert_eq!(finalize_answer(&Answer::new(raw)), GUIDANCE_MESSAGE);
        }
    }

    #[test]
    fn other_answers_pass_through() {
        let answer = Answer::new("Relevant information was found on page 3.");
        assert_eq!(
            finalize_answer(&answer),
            "Relevant information was found on page 3."
        );
    }

    #[test]
    fn missing_answer_is_empty() {
        assert_eq!(finalize_answer(&Answer::default()), "");
    }

    #[test]
    fn chunks_end_with_a_single_space() {
        let chunks = word_chunks("alpha beta gamma");
        assert_eq!(chunks, vec!["alpha ", "beta ", "gamma "]);
    }

    #[test]
    fn chunks_rejoin_to_original() {
        for answer in [
            "plain sentence",
            "line one\nline two  with double space",
            "trailing punctuation!",
            "",
            GUIDANCE_MESSAGE,
        ] {
            assert_eq!(rejoin(&word_chunks(answer)), answer);
        }
    }
}
