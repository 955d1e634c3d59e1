//! Terminal chat client.
//!
//! Drives an [`InputBar`] from stdin and talks to a running server:
//!
//! | Input | Effect |
//! |-------|--------|
//! | `text` | append to the draft and press Enter (send) |
//! | `text\` | append to the draft and press Shift+Enter (new line) |
//! | `/attach <path>` | select a `.pdf` / `.docx` file |
//! | `/clear` | remove the selected file |
//! | `/send` | press the send control |
//! | `/quit` | exit |
//!
//! A send uploads the selected file first, then asks the draft text (if
//! any) with the whole conversation so far, printing the answer as it
//! streams in.

use std::io::Write;

use anyhow::{bail, Context, Result};
use docchat_core::input_bar::{InputBar, Key, Outgoing, SelectedFile};
use docchat_core::models::{ChatMessage, ChatRequest};
use futures::StreamExt;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct UploadBody {
    message: String,
}

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    history: Vec<ChatMessage>,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Uploads `file` to `/api/upload`; returns the server's message.
    pub async fn upload(&self, file: &SelectedFile) -> Result<String> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .with_context(|| format!("Failed to read {}", file.path.display()))?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file.name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(format!("{}/api/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            bail!("upload failed: {}", error_message(resp).await);
        }
        Ok(resp.json::<UploadBody>().await?.message)
    }

    /// Sends `text` with the conversation so far and passes each decoded
    /// piece of the streamed answer to `on_text`. Returns the full answer.
    pub async fn ask(&mut self, text: &str, mut on_text: impl FnMut(&str)) -> Result<String> {
        self.history.push(ChatMessage::user(text));
        let request = ChatRequest {
            messages: self.history.clone(),
        };

        let resp = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;
        if !resp.status().is_success() {
            self.history.pop();
            bail!("chat failed: {}", error_message(resp).await);
        }

        let mut answer = String::new();
        let mut pending: Vec<u8> = Vec::new();
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            pending.extend_from_slice(&chunk?);
            let piece = drain_utf8(&mut pending);
            if !piece.is_empty() {
                on_text(&piece);
                answer.push_str(&piece);
            }
        }
        if !pending.is_empty() {
            let rest = String::from_utf8_lossy(&pending).into_owned();
            on_text(&rest);
            answer.push_str(&rest);
        }

        let answer = answer.trim_end().to_string();
        self.history.push(ChatMessage::assistant(answer.clone()));
        Ok(answer)
    }

    /// Performs everything a send from the input bar implies.
    pub async fn send(&mut self, outgoing: Outgoing, out: &mut impl Write) -> Result<()> {
        if let Some(file) = &outgoing.file {
            let message = self.upload(file).await?;
            writeln!(out, "[{}: {}]", file.name, message)?;
        }
        if !outgoing.text.trim().is_empty() {
            // The stream is drained even if the terminal stops accepting
            // output; the first write error is reported afterwards.
            let mut write_error: Option<std::io::Error> = None;
            self.ask(&outgoing.text, |piece| {
                if write_error.is_none() {
                    if let Err(e) = write!(out, "{}", piece).and_then(|_| out.flush()) {
                        write_error = Some(e);
                    }
                }
            })
            .await?;
            if let Some(e) = write_error {
                return Err(e).context("Failed to write answer");
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

async fn error_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    }
}

/// Removes and returns the longest valid UTF-8 prefix of `buf`, leaving an
/// incomplete trailing sequence in place. Invalid bytes are replaced.
fn drain_utf8(buf: &mut Vec<u8>) -> String {
    let valid = match std::str::from_utf8(buf) {
        Ok(_) => buf.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => {
            let text = String::from_utf8_lossy(buf).into_owned();
            buf.clear();
            return text;
        }
    };
    let rest = buf.split_off(valid);
    let text = String::from_utf8_lossy(buf).into_owned();
    *buf = rest;
    text
}

/// Runs the interactive client against `base_url` until EOF or `/quit`.
pub async fn run_repl(base_url: &str) -> Result<()> {
    let mut client = ChatClient::new(base_url);
    let mut bar = InputBar::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    println!("Connected to {}. Type /quit to exit, /attach <path> to add a document.", base_url);
    prompt(&bar)?;

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        let outgoing = if trimmed == "/quit" {
            break;
        } else if let Some(path) = trimmed.strip_prefix("/attach ") {
            if let Err(e) = bar.select_file(SelectedFile::from_path(path.trim())) {
                eprintln!("{}", e);
            }
            None
        } else if trimmed == "/clear" {
            bar.clear_file();
            None
        } else if trimmed == "/send" {
            bar.press_send()
        } else if let Some(partial) = line.strip_suffix('\\') {
            bar.input(format!("{}{}", bar.draft(), partial));
            bar.key_down(Key::Enter, true)
        } else {
            bar.input(format!("{}{}", bar.draft(), line));
            bar.key_down(Key::Enter, false)
        };

        if let Some(outgoing) = outgoing {
            bar.set_loading(true);
            if let Err(e) = client.send(outgoing, &mut stdout).await {
                eprintln!("Error: {:#}", e);
            }
            bar.set_loading(false);
        }
        prompt(&bar)?;
    }

    Ok(())
}

fn prompt(bar: &InputBar) -> Result<()> {
    let mut stdout = std::io::stdout();
    match bar.file() {
        Some(file) => write!(stdout, "[{}] > ", file.name)?,
        None if !bar.draft().is_empty() => write!(stdout, "... ")?,
        None => write!(stdout, "> ")?,
    }
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_keeps_incomplete_sequence() {
        let snowman = "☃".as_bytes();
        let mut buf = b"hi ".to_vec();
        buf.extend_from_slice(&snowman[..1]);

        assert_eq!(drain_utf8(&mut buf), "hi ");
        assert_eq!(buf, snowman[..1].to_vec());

        buf.extend_from_slice(&snowman[1..]);
        assert_eq!(drain_utf8(&mut buf), "☃");
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_replaces_invalid_bytes() {
        let mut buf = vec![b'a', 0xff, b'b'];
        assert_eq!(drain_utf8(&mut buf), "a\u{fffd}b");
        assert!(buf.is_empty());
    }

    use std::sync::Arc;

    use docchat_core::store::memory::InMemoryStore;
    use docchat_core::store::KnowledgeStore;

    use crate::config::Config;
    use crate::memory::MemoryAccessor;

    /// Serves the router on an ephemeral port; returns its base URL.
    async fn spawn_server(answer: &str) -> String {
        let mut config = Config::minimal();
        config.streaming.delay_ms = 0;
        let store: Arc<dyn KnowledgeStore> = Arc::new(InMemoryStore::new().with_answer(answer));
        let app = crate::server::router(&config, MemoryAccessor::fixed(store));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn text_only(text: &str) -> Outgoing {
        Outgoing {
            text: text.to_string(),
            file: None,
        }
    }

    #[tokio::test]
    async fn send_prints_streamed_answer_and_records_history() {
        let url = spawn_server("Paris is the capital.").await;
        let mut client = ChatClient::new(url);
        let mut out: Vec<u8> = Vec::new();

        client
            .send(text_only("capital of France?"), &mut out)
            .await
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Paris is the capital. \n");
        assert_eq!(
            client.history(),
            &[
                ChatMessage::user("capital of France?"),
                ChatMessage::assistant("Paris is the capital."),
            ]
        );
    }

    #[tokio::test]
    async fn send_reports_output_write_failure() {
        let url = spawn_server("some answer").await;
        let mut client = ChatClient::new(url);

        let err = client
            .send(text_only("question"), &mut BrokenPipe)
            .await
            .unwrap_err();

        let io = err.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::BrokenPipe);
        // The answer still completed and is kept in the conversation.
        assert_eq!(client.history().len(), 2);
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = ChatClient::new("http://127.0.0.1:3000/");
        assert_eq!(client.base_url, "http://127.0.0.1:3000");
        assert!(client.history().is_empty());
    }
}
