//! # Context Loop Core
//!
//! Runtime-free logic for Context Loop: context models, the flattened
//! prompt representation, domain-source and context-store abstractions with
//! in-memory implementations, similarity ranking, embedding utilities, the
//! embedded command scanner, and direct action-intent detection.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! The `context-loop` crate supplies the SQLite implementations, providers,
//! and the orchestrator.

pub mod api;
pub mod command;
pub mod domain;
pub mod embedding;
pub mod embedding_text;
pub mod intent;
pub mod models;
pub mod similarity;
pub mod store;
pub mod structured;
pub mod text;
