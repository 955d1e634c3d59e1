//! # docchat
//!
//! A minimal chat-with-documents server. Users upload PDF or DOCX files into
//! a single knowledge store and ask questions about them; answers are
//! streamed back word by word.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  file   ┌──────────────┐  ingest  ┌─────────────────┐
//! │ Input Bar  │────────▶│ /api/upload  │─────────▶│                 │
//! │ (client)   │         └──────────────┘          │ KnowledgeStore  │
//! │            │  text   ┌──────────────┐  query   │ command|sqlite  │
//! │            │────────▶│  /api/chat   │─────────▶│                 │
//! └────────────┘◀────────└──────────────┘          └─────────────────┘
//!                 words
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat init                      # create the store
//! docchat put report.pdf            # ingest a document
//! docchat ask "what was revenue?"   # one-shot question
//! docchat serve                     # start the HTTP server
//! docchat chat                      # terminal client
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`memory`] | Opens the configured knowledge store |
//! | [`command_store`] | Store backed by an external CLI |
//! | [`sqlite_store`] | Built-in SQLite store with keyword search |
//! | [`extract`] | PDF / DOCX / text extraction |
//! | [`chunk`] | Paragraph chunking |
//! | [`upload`] | Temp-file upload pipeline |
//! | [`chat`] | Answer shaping and paced streaming |
//! | [`server`] | HTTP server |
//! | [`client`] | Terminal chat client |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod chunk;
pub mod client;
pub mod command_store;
pub mod config;
pub mod db;
pub mod extract;
pub mod memory;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
pub mod upload;
