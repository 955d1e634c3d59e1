//! Upload pipeline: temp file → ingest → cleanup.
//!
//! The uploaded bytes are written to
//! `<upload_dir>/<prefix>-<unix_millis>-<sanitized name>`, handed to
//! [`KnowledgeStore::ingest`], and removed afterwards whatever the outcome.
//! The file is created exclusively; if two uploads of the same name land in
//! the same millisecond the later one moves to the next free timestamp.

use std::io::Write;
use std::path::{Path, PathBuf};

use docchat_core::models::IngestSummary;
use docchat_core::store::{IngestError, KnowledgeStore};
use thiserror::Error;

/// Attempts at finding a free temp path before giving up.
const MAX_PATH_ATTEMPTS: i64 = 64;

pub const SUCCESS_MESSAGE: &str = "File ingested into knowledge store";

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub dir: PathBuf,
    pub prefix: String,
    pub fail_on_error: bool,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to write upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub message: String,
    /// `None` when ingestion failed and failures are not reported.
    pub summary: Option<IngestSummary>,
}

/// Replaces every character outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn temp_upload_path(dir: &Path, prefix: &str, millis: i64, name: &str) -> PathBuf {
    dir.join(format!("{}-{}-{}", prefix, millis, sanitize_filename(name)))
}

/// Recovers the (sanitized) client file name from a path built by
/// [`temp_upload_path`]. Other names are returned unchanged.
pub fn original_name<'a>(file_name: &'a str, prefix: &str) -> &'a str {
    let Some(rest) = file_name
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('-'))
    else {
        return file_name;
    };
    match rest.split_once('-') {
        Some((millis, name))
            if !millis.is_empty()
                && !name.is_empty()
                && millis.bytes().all(|b| b.is_ascii_digit()) =>
        {
            name
        }
        _ => file_name,
    }
}

/// A written upload; the file is removed on drop.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Creates a fresh temp file holding `bytes`.
    pub fn write(dir: &Path, prefix: &str, name: &str, bytes: &[u8]) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let start = chrono::Utc::now().timestamp_millis();

        for offset in 0..MAX_PATH_ATTEMPTS {
            let path = temp_upload_path(dir, prefix, start + offset, name);
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    let upload = Self { path };
                    file.write_all(bytes)?;
                    file.flush()?;
                    return Ok(upload);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free upload path for {}", name),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "temp upload cleanup failed");
        }
    }
}

/// Writes `bytes` to a temp file, ingests it into `store` and removes the
/// file again.
pub async fn process_upload(
    store: &dyn KnowledgeStore,
    settings: &UploadSettings,
    file_name: &str,
    bytes: &[u8],
) -> Result<UploadOutcome, UploadError> {
    let upload = TempUpload::write(&settings.dir, &settings.prefix, file_name, bytes)?;
    tracing::info!(
        file = %file_name,
        bytes = bytes.len(),
        path = %upload.path().display(),
        "ingesting upload"
    );

    let result = store.ingest(upload.path()).await;
    drop(upload);

    match result {
        Ok(summary) => {
            tracing::info!(
                file = %file_name,
                documents = summary.documents,
                chunks = summary.chunks,
                "upload ingested"
            );
            Ok(UploadOutcome {
                message: SUCCESS_MESSAGE.to_string(),
                summary: Some(summary),
            })
        }
        Err(e) if settings.fail_on_error => {
            tracing::error!(file = %file_name, error = %e, "ingestion failed");
            Err(UploadError::Ingest(e))
        }
        Err(e) => {
            tracing::error!(file = %file_name, error = %e, "ingestion failed (not reported to client)");
            Ok(UploadOutcome {
                message: SUCCESS_MESSAGE.to_string(),
                summary: None,
            })
        }
    }
}
