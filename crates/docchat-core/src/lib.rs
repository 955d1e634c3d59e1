//! # docchat core
//!
//! Shared, runtime-free logic for docchat: chat models, answer shaping,
//! the [`store::KnowledgeStore`] capability trait and the client-side
//! [`input_bar::InputBar`] state machine.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. The server
//! and terminal client in the `docchat` crate build on it.

pub mod answer;
pub mod input_bar;
pub mod models;
pub mod store;
