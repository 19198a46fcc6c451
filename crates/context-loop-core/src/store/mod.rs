//! Storage abstraction for cached context.
//!
//! The [`ContextStore`] trait is the repository layer behind the context
//! engine and semantic search: cached context items, their embedding
//! vectors, and their summaries. It holds no business logic.
//!
//! # Tenant scoping
//!
//! Every operation takes a `workspace_id` and implementations must apply it
//! as the first filter of every read and write. An item that exists but
//! belongs to another workspace is indistinguishable from a missing one.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ContextKind, ContextObject};

/// Default cap on how many stored vectors a single search scores.
pub const DEFAULT_CANDIDATE_POOL: usize = 500;

/// A cached context snapshot, unique per `(context_id, kind, workspace_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextItemRecord {
    /// Store-assigned UUID. Stable across upserts of the same context.
    pub id: String,
    /// Id of the entity the snapshot describes.
    pub context_id: String,
    pub workspace_id: String,
    #[serde(rename = "type")]
    pub kind: ContextKind,
    pub title: String,
    pub summary: String,
    /// The serialized [`ContextObject`].
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContextItemRecord {
    /// Build a fresh record for `ctx`. Stores keep the original `id` and
    /// `created_at` when the record already exists.
    pub fn from_context(ctx: &ContextObject) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            context_id: ctx.id().to_string(),
            workspace_id: ctx.workspace_id().to_string(),
            kind: ctx.kind(),
            title: ctx.title(),
            summary: ctx.summary(),
            data: serde_json::to_value(ctx)?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Decode the cached snapshot.
    pub fn context(&self) -> Result<ContextObject> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// One vector per context item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRecord {
    pub context_item_id: String,
    pub vector: Vec<f32>,
    pub workspace_id: String,
    pub model: String,
    /// SHA-256 of the text the vector was computed from.
    pub content_hash: String,
    pub updated_at: DateTime<Utc>,
}

/// An override summary for a context item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub context_item_id: String,
    pub summary: String,
    pub workspace_id: String,
}

/// A search result: the cached item and its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: ContextItemRecord,
    pub score: f32,
}

/// Abstract cache for context items, vectors, and summaries.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save`](ContextStore::save) | Upsert a snapshot by `(context_id, kind, workspace_id)` |
/// | [`get`](ContextStore::get) | Fetch by `(context_id, kind, workspace_id)` |
/// | [`get_item`](ContextStore::get_item) | Fetch by item id |
/// | [`list`](ContextStore::list) | Page through a workspace's items |
/// | [`list_ids_after`](ContextStore::list_ids_after) | Keyset page of item ids, stable under upserts |
/// | [`delete`](ContextStore::delete) | Remove an item with its vector and summary |
/// | [`save_embedding`](ContextStore::save_embedding) | Upsert the item's vector |
/// | [`search`](ContextStore::search) | Capped cosine-similarity scan |
/// | [`save_summary`](ContextStore::save_summary) | Upsert an override summary |
/// | [`get_summary`](ContextStore::get_summary) | Override summary, else inline summary |
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Insert or update a snapshot. Returns the stored record.
    async fn save(&self, ctx: &ContextObject) -> Result<ContextItemRecord>;

    async fn get(
        &self,
        context_id: &str,
        kind: ContextKind,
        workspace_id: &str,
    ) -> Result<Option<ContextItemRecord>>;

    async fn get_item(&self, item_id: &str, workspace_id: &str)
        -> Result<Option<ContextItemRecord>>;

    /// Most recently updated first; ties broken by item id.
    async fn list(
        &self,
        workspace_id: &str,
        kind: Option<ContextKind>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ContextItemRecord>>;

    /// Item ids in ascending order, strictly after `after_id`.
    ///
    /// Ids survive upserts, so paging with the last returned id neither
    /// skips nor repeats items while contexts are re-cached.
    async fn list_ids_after(
        &self,
        workspace_id: &str,
        after_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>>;

    async fn count(&self, workspace_id: &str, kind: Option<ContextKind>) -> Result<usize>;

    /// Returns `true` if an item was removed.
    async fn delete(&self, item_id: &str, workspace_id: &str) -> Result<bool>;

    /// Upsert the vector for an item. Fails if the item is not in
    /// `workspace_id`.
    async fn save_embedding(
        &self,
        item_id: &str,
        vector: &[f32],
        workspace_id: &str,
        model: &str,
        content_hash: &str,
    ) -> Result<()>;

    async fn get_embedding(&self, item_id: &str, workspace_id: &str)
        -> Result<Option<EmbeddingRecord>>;

    /// Score at most the candidate-pool cap of the workspace's most recently
    /// embedded items against `vector` and return the best `limit`.
    async fn search(
        &self,
        workspace_id: &str,
        vector: &[f32],
        kind: Option<ContextKind>,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    async fn save_summary(&self, item_id: &str, summary: &str, workspace_id: &str) -> Result<()>;

    /// The override summary if one was saved, otherwise the item's inline
    /// summary. `None` only when the item is not in the workspace.
    async fn get_summary(&self, item_id: &str, workspace_id: &str) -> Result<Option<String>>;
}
