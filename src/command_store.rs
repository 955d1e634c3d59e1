//! [`KnowledgeStore`] backed by an external command-line tool.
//!
//! Each operation spawns the configured program with its argument template
//! rendered (`{store}`, `{input}`, `{query}`), waits at most
//! `timeout_secs`, and checks the exit status. A non-zero exit, a spawn
//! failure or a timeout is a typed [`CommandFailure`]; output on stderr
//! alone is only logged, since such tools often report progress there.
//!
//! Each template entry is passed as exactly one argument, with placeholders
//! substituted inside it. Tools that parse a dash-leading value as a flag
//! can be given `--question={query}` instead of a separate `{query}`.
//!
//! `ask` output is read as JSON `{"answer": ...}` when it parses, otherwise
//! the trimmed stdout is the answer.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use docchat_core::models::{Answer, IngestSummary};
use docchat_core::store::{CommandFailure, IngestError, KnowledgeStore, QueryError};
use tokio::process::Command;

use crate::config::CommandConfig;

pub struct CommandStore {
    store_path: PathBuf,
    command: CommandConfig,
}

struct CommandOutput {
    stdout: String,
    stderr: String,
}

impl CommandStore {
    pub fn new(store_path: impl Into<PathBuf>, command: CommandConfig) -> Self {
        Self {
            store_path: store_path.into(),
            command,
        }
    }

    fn render(&self, templates: &[String], placeholder: &str, value: &str) -> Vec<String> {
        let store = self.store_path.to_string_lossy();
        templates
            .iter()
            .map(|arg| arg.replace("{store}", &store).replace(placeholder, value))
            .collect()
    }

    async fn run(&self, args: &[String]) -> Result<CommandOutput, CommandFailure> {
        let program = self.command.program.clone();
        let secs = self.command.timeout_secs;

        let child = Command::new(&program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandFailure::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output())
            .await
            .map_err(|_| CommandFailure::Timeout {
                program: program.clone(),
                secs,
            })?
            .map_err(|source| CommandFailure::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(CommandFailure::Exit {
                program,
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        if !stderr.trim().is_empty() {
            tracing::warn!(program = %program, stderr = %stderr.trim(), "store command wrote to stderr");
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

fn parse_answer(stdout: &str) -> Answer {
    let trimmed = stdout.trim();
    serde_json::from_str::<Answer>(trimmed).unwrap_or_else(|_| Answer::new(trimmed))
}

#[async_trait]
impl KnowledgeStore for CommandStore {
    async fn ingest(&self, path: &Path) -> Result<IngestSummary, IngestError> {
        let args = self.render(
            &self.command.put_args,
            "{input}",
            &path.to_string_lossy(),
        );
        tracing::info!(
            input = %path.display(),
            store = %self.store_path.display(),
            "ingesting via {}",
            self.command.program
        );

        let output = self.run(&args).await?;
        tracing::info!(stdout = %output.stdout.trim(), "ingest command finished");

        Ok(IngestSummary {
            source: path.display().to_string(),
            documents: 1,
            chunks: 0,
            detail: Some(output.stdout.trim().to_string()).filter(|s| !s.is_empty()),
        })
    }

    async fn query(&self, text: &str) -> Result<Answer, QueryError> {
        let args = self.render(&self.command.ask_args, "{query}", text);
        let output = self.run(&args).await?;
        if output.stdout.trim().is_empty() && !output.stderr.trim().is_empty() {
            tracing::debug!("ask command produced no stdout");
        }
        Ok(parse_answer(&output.stdout))
    }
}
