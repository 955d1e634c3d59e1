//! # docchat CLI
//!
//! The `docchat` binary runs the chat server and offers direct access to the
//! knowledge store.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the knowledge store |
//! | `docchat serve` | Start the HTTP server |
//! | `docchat put <file>` | Ingest a file into the store |
//! | `docchat ask "<question>"` | Query the store and print the answer |
//! | `docchat chat` | Interactive terminal client for a running server |
//!
//! A missing config file is not an error: built-in defaults are used.
//! Set `RUST_LOG` to change log verbosity (default `info`).

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use docchat::config::{self, Config, StoreBackend};
use docchat::{client, memory, server, sqlite_store::SqliteStore};
use docchat_core::answer::finalize_answer;
use tracing_subscriber::EnvFilter;

/// docchat: chat with your documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "Upload documents into a knowledge store and chat with them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docchat.toml`. Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the knowledge store.
    ///
    /// For the SQLite backend this creates the database file and schema.
    /// Idempotent.
    Init,

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves `/api/upload`, `/api/chat` and
    /// `/health`.
    Serve,

    /// Ingest a file into the knowledge store.
    Put {
        /// Path to a PDF, DOCX or text file.
        file: PathBuf,
    },

    /// Ask the knowledge store a question and print the answer.
    Ask {
        /// The question.
        question: String,
    },

    /// Chat with a running server from the terminal.
    Chat {
        /// Base URL of the server.
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        url: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Init => run_init(&config::load_or_minimal(&cli.config)?).await?,
        Commands::Serve => server::run_server(&config::load_or_minimal(&cli.config)?).await?,
        Commands::Put { file } => run_put(&config::load_or_minimal(&cli.config)?, &file).await?,
        Commands::Ask { question } => {
            run_ask(&config::load_or_minimal(&cli.config)?, &question).await?
        }
        // The client only talks HTTP and never reads the config
        Commands::Chat { url } => client::run_repl(&url).await?,
    }

    Ok(())
}

async fn run_init(cfg: &Config) -> anyhow::Result<()> {
    match cfg.store.backend {
        StoreBackend::Sqlite => {
            SqliteStore::open(cfg).await?;
            println!(
                "Knowledge store initialized at {}.",
                cfg.store.path.display()
            );
        }
        StoreBackend::Command => {
            println!(
                "Command backend: {} is created by `{}` on first ingest.",
                cfg.store.path.display(),
                cfg.store.command.program
            );
        }
    }
    Ok(())
}

async fn run_put(cfg: &Config, file: &Path) -> anyhow::Result<()> {
    if !file.is_file() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let store = memory::open_store(cfg).await?;
    let summary = store
        .ingest(file)
        .await
        .with_context(|| format!("Failed to ingest {}", file.display()))?;

    println!("Ingested {}", summary.source);
    println!("  documents: {}", summary.documents);
    println!("  chunks:    {}", summary.chunks);
    if let Some(detail) = summary.detail.as_deref().filter(|d| !d.is_empty()) {
        println!("{}", detail);
    }
    Ok(())
}

async fn run_ask(cfg: &Config, question: &str) -> anyhow::Result<()> {
    let store = memory::open_store(cfg).await?;
    let answer = store
        .query(question)
        .await
        .context("Failed to query knowledge store")?;
    println!("{}", finalize_answer(&answer));
    Ok(())
}
