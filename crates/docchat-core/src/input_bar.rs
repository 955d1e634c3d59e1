//! Chat input state machine.
//!
//! Mirrors the behaviour of the chat input bar: a free-text draft, at most
//! one attached document, an auto-growing height and a caller-controlled
//! loading flag. Rendering is left to the front end; this type only decides
//! what a key press or click does.
//!
//! ```text
//!   Idle ──text/file──▶ Composing ──send──▶ Sending ──loading off──▶ Idle
//!     ▲                     │
//!     └──clear text+file────┘
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

/// File extensions the attachment picker offers.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "docx"];

/// Height of one line of text, in pixels.
pub const LINE_HEIGHT_PX: u32 = 24;
/// Vertical padding around the text, in pixels.
pub const PADDING_PX: u32 = 24;
/// The input never grows past this height.
pub const MAX_HEIGHT_PX: u32 = 200;

/// Coarse state of the input bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPhase {
    /// Empty draft, no file.
    Idle,
    /// Draft text and/or a file are present.
    Composing,
    /// The caller is processing a send; all triggers are disabled.
    Sending,
}

/// Keys the input bar reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Other,
}

/// A document chosen through the attachment control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
}

impl SelectedFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }
}

/// What the bar hands to the send callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub text: String,
    pub file: Option<SelectedFile>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("unsupported file type: {0} (accepted: .pdf, .docx)")]
    UnsupportedFile(String),
    #[error("input is disabled while a message is being sent")]
    Disabled,
}

/// Returns true if `name` has one of the [`ACCEPTED_EXTENSIONS`].
pub fn is_accepted_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct InputBar {
    draft: String,
    file: Option<SelectedFile>,
    height_px: u32,
    loading: bool,
}

impl Default for InputBar {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBar {
    pub fn new() -> Self {
        Self {
            draft: String::new(),
            file: None,
            height_px: height_for(""),
            loading: false,
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn height_px(&self) -> u32 {
        self.height_px
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn phase(&self) -> InputPhase {
        if self.loading {
            InputPhase::Sending
        } else if self.draft.is_empty() && self.file.is_none() {
            InputPhase::Idle
        } else {
            InputPhase::Composing
        }
    }

    /// Declared by the caller while it processes a send.
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Whether the send control is enabled.
    pub fn can_send(&self) -> bool {
        !self.loading && (!self.draft.trim().is_empty() || self.file.is_some())
    }

    /// Replaces the draft text and resizes.
    pub fn input(&mut self, text: impl Into<String>) {
        if self.loading {
            return;
        }
        self.draft = text.into();
        self.height_px = height_for(&self.draft);
    }

    /// Selects a file, replacing any previous selection.
    pub fn select_file(&mut self, file: SelectedFile) -> Result<(), InputError> {
        if self.loading {
            return Err(InputError::Disabled);
        }
        if !is_accepted_file(&file.name) {
            return Err(InputError::UnsupportedFile(file.name));
        }
        self.file = Some(file);
        Ok(())
    }

    pub fn clear_file(&mut self) {
        self.file = None;
    }

    /// Handles a key press. `Enter` sends; `Shift+Enter` inserts a newline.
    pub fn key_down(&mut self, key: Key, shift: bool) -> Option<Outgoing> {
        match key {
            Key::Enter if shift => {
                if !self.loading {
                    let mut text = std::mem::take(&mut self.draft);
                    text.push('\n');
                    self.input(text);
                }
                None
            }
            Key::Enter => self.send(),
            Key::Other => None,
        }
    }

    /// Handles a click on the send control.
    pub fn press_send(&mut self) -> Option<Outgoing> {
        self.send()
    }

    fn send(&mut self) -> Option<Outgoing> {
        if !self.can_send() {
            return None;
        }
        let outgoing = Outgoing {
            text: std::mem::take(&mut self.draft),
            file: self.file.take(),
        };
        self.height_px = height_for("");
        Some(outgoing)
    }
}

fn height_for(text: &str) -> u32 {
    let lines = text.split('\n').count() as u32;
    (lines * LINE_HEIGHT_PX + PADDING_PX).min(MAX_HEIGHT_PX)
}
