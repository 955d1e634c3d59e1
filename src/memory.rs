//! Memory accessor: hands out a handle to the shared knowledge store.
//!
//! Handles are opened fresh on every call, read-write, creating the store
//! file if it does not exist. There is no pooling and no explicit close;
//! dropping the handle releases it.

use std::sync::Arc;

use anyhow::{Context, Result};
use docchat_core::store::KnowledgeStore;

use crate::command_store::CommandStore;
use crate::config::{Config, StoreBackend};
use crate::sqlite_store::SqliteStore;

#[derive(Clone)]
enum Source {
    Configured(Arc<Config>),
    Fixed(Arc<dyn KnowledgeStore>),
}

/// Opens the configured store, or returns a pre-built one.
#[derive(Clone)]
pub struct MemoryAccessor {
    source: Source,
}

impl MemoryAccessor {
    /// Opens `config.store.path` with the configured backend on every call.
    pub fn from_config(config: Arc<Config>) -> Self {
        Self {
            source: Source::Configured(config),
        }
    }

    /// Always returns `store`. For embedding and tests.
    pub fn fixed(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            source: Source::Fixed(store),
        }
    }

    pub async fn open(&self) -> Result<Arc<dyn KnowledgeStore>> {
        match &self.source {
            Source::Fixed(store) => Ok(store.clone()),
            Source::Configured(config) => open_store(config).await,
        }
    }
}

/// Opens the store named by `config.store.path`.
pub async fn open_store(config: &Config) -> Result<Arc<dyn KnowledgeStore>> {
    let store: Arc<dyn KnowledgeStore> = match config.store.backend {
        StoreBackend::Command => Arc::new(CommandStore::new(
            config.store.path.clone(),
            config.store.command.clone(),
        )),
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(config).await.with_context(|| {
            format!(
                "Failed to open knowledge store: {}",
                config.store.path.display()
            )
        })?),
    };
    Ok(store)
}
