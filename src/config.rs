//! TOML configuration.
//!
//! Every section has defaults, so an empty file (or [`Config::minimal`])
//! yields a working setup that shells out to `npx memvid` against
//! `knowledge.mv2` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Delegate to an external command-line tool.
    #[default]
    Command,
    /// Built-in single-file SQLite store with keyword search.
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub command: CommandConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            backend: StoreBackend::default(),
            command: CommandConfig::default(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("knowledge.mv2")
}

/// External tool invocation. Arguments may contain the placeholders
/// `{store}`, `{input}` (put only) and `{query}` (ask only).
///
/// Placeholders are substituted inside an argument, and each template entry
/// stays one argv element. A question starting with `-` given as its own
/// element (`"--question", "{query}"`) may be parsed as a flag by the tool;
/// `"--question={query}"` keeps it bound to the option.
#[derive(Debug, Deserialize, Clone)]
pub struct CommandConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_put_args")]
    pub put_args: Vec<String>,
    #[serde(default = "default_ask_args")]
    pub ask_args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            put_args: default_put_args(),
            ask_args: default_ask_args(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_program() -> String {
    "npx".to_string()
}
fn default_put_args() -> Vec<String> {
    ["memvid", "put", "{store}", "--input", "{input}", "--embedding"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_ask_args() -> Vec<String> {
    ["memvid", "ask", "{store}", "--question", "{query}", "--json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory for transient uploads. Defaults to the OS temp dir.
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,
    #[serde(default = "default_upload_prefix")]
    pub upload_prefix: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            upload_dir: None,
            upload_prefix: default_upload_prefix(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}
fn default_upload_prefix() -> String {
    "docchat-upload".to_string()
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamingConfig {
    /// Pause after each streamed word. `0` disables pacing.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_delay_ms() -> u64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Report ingestion failures to the uploader instead of only logging them.
    #[serde(default = "default_fail_on_error")]
    pub fail_on_error: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fail_on_error: default_fail_on_error(),
        }
    }
}

fn default_fail_on_error() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_final_limit")]
    pub final_limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            final_limit: default_final_limit(),
        }
    }
}

fn default_final_limit() -> i64 {
    3
}

impl Config {
    /// Built-in defaults, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Loads `path` if it exists, otherwise falls back to [`Config::minimal`].
pub fn load_or_minimal(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.store.path.as_os_str().is_empty() {
        anyhow::bail!("store.path must not be empty");
    }

    if config.store.backend == StoreBackend::Command {
        let cmd = &config.store.command;
        if cmd.program.trim().is_empty() {
            anyhow::bail!("store.command.program must not be empty");
        }
        if !cmd.put_args.iter().any(|a| a.contains("{input}")) {
            anyhow::bail!("store.command.put_args must reference {{input}}");
        }
        if !cmd.ask_args.iter().any(|a| a.contains("{query}")) {
            anyhow::bail!("store.command.ask_args must reference {{query}}");
        }
        if cmd.timeout_secs == 0 {
            anyhow::bail!("store.command.timeout_secs must be > 0");
        }
    }

    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }

    if config.server.upload_prefix.is_empty() {
        anyhow::bail!("server.upload_prefix must not be empty");
    }

    Ok(())
}
