//! # Context Loop
//!
//! Backend for a contextual assistant embedded in a workspace product.
//!
//! A question arrives with the workspace, the user, the surface it was asked
//! from, and optional anchors (page, project, task). Context Loop gathers
//! tenant-scoped context from the workspace's entities and a cache of
//! context snapshots, optionally ranks cached items by embedding similarity,
//! asks a language model, and executes the messaging commands the model
//! embeds in its answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Domain rows  │──▶│ContextEngine │──▶│ ContextStore │
//! │ (SQLite)     │   │  builders    │   │ items + vecs │
//! └──────────────┘   └──────┬───────┘   └──────┬───────┘
//!                           │                  │
//!                           ▼                  ▼
//!                    ┌──────────────┐   ┌──────────────┐
//!                    │ Orchestrator │◀──│SemanticIndex │
//!                    │ prompt + LLM │   │  embeddings  │
//!                    └──────┬───────┘   └──────────────┘
//!                           │
//!               ┌───────────┴───────────┐
//!               ▼                       ▼
//!         ┌──────────┐            ┌──────────┐
//!         │   CLI    │            │   HTTP   │
//!         │(loopctl) │            │  /v1/*   │
//!         └──────────┘            └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! loopctl init
//! loopctl ask ws1 u1 "What is blocking the launch?" --mode dashboard
//! loopctl embed backfill ws1
//! loopctl serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite [`ContextStore`](context_loop_core::store::ContextStore) |
//! | [`sqlite_domain`] | SQLite [`DomainSource`](context_loop_core::domain::DomainSource) |
//! | [`embedding`] | Embedding provider construction |
//! | [`semantic`] | Item embedding, similarity search, backfill |
//! | [`engine`] | Context builders and structured slices |
//! | [`llm`] | Language-model client |
//! | [`actions`] | Messaging integration |
//! | [`orchestrator`] | End-to-end request handling |
//! | [`services`] | Shared service graph |
//! | [`server`] | HTTP API |
//! | [`error`] | Request-level error taxonomy |
//! | [`logging`] | `tracing` subscriber setup |

pub mod actions;
pub mod ask;
pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod get;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod orchestrator;
pub mod search;
pub mod semantic;
pub mod server;
pub mod services;
pub mod sqlite_domain;
pub mod sqlite_store;
