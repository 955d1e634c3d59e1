//! Paragraph-boundary text chunker for the SQLite store.
//!
//! Paragraphs (`\n\n`-separated) are packed into chunks of at most
//! `max_tokens` (approximated as 4 chars per token). A paragraph longer than
//! the limit is hard-split at the last whitespace before the boundary.

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = (max_tokens * CHARS_PER_TOKEN).max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let would_be = if current.is_empty() {
            para.len()
        } else {
            current.len() + 2 + para.len()
        };
        if would_be > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if para.len() > max_chars {
            split_long(para, max_chars, &mut chunks);
            continue;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_long(para: &str, max_chars: usize, chunks: &mut Vec<String>) {
    let mut remaining = para;
    while !remaining.is_empty() {
        if remaining.len() <= max_chars {
            chunks.push(remaining.to_string());
            break;
        }
        let mut boundary = max_chars;
        while !remaining.is_char_boundary(boundary) {
            boundary -= 1;
        }
        let split_at = remaining[..boundary]
            .rfind(char::is_whitespace)
            .filter(|&pos| pos > 0)
            .unwrap_or(boundary);
        let split_at = if split_at == 0 {
            remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len())
        } else {
            split_at
        };
        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        remaining = remaining[split_at..].trim_start();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text("\n\n  \n\n", 10).is_empty());
    }

    #[test]
    fn small_paragraphs_are_packed_together() {
        let chunks = chunk_text("one\n\ntwo\n\nthree", 100);
        assert_eq!(chunks, vec!["one\n\ntwo\n\nthree"]);
    }

    #[test]
    fn paragraphs_flush_at_limit() {
        // 2 tokens = 8 chars
        let chunks = chunk_text("aaaa\n\nbbbb\n\ncccc", 2);
        assert_eq!(chunks, vec!["aaaa", "bbbb", "cccc"]);
    }

    #[test]
    fn long_paragraph_is_split_on_whitespace() {
        let chunks = chunk_text("alpha beta gamma delta", 3);
        assert!(chunks.iter().all(|c| c.len() <= 12));
        assert_eq!(chunks.join(" "), "alpha beta gamma delta");
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let text = "é".repeat(40);
        let chunks = chunk_text(&text, 2);
        assert_eq!(chunks.concat(), text);
    }
}
