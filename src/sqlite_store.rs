//! SQLite-backed [`ContextStore`] implementation.
//!
//! Every statement carries a `workspace_id = ?` predicate. Similarity
//! search loads a recency-ordered candidate window with one query and ranks
//! it in process through a [`SimilarityIndex`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use context_loop_core::embedding::{blob_to_vec, vec_to_blob};
use context_loop_core::models::{ContextKind, ContextObject};
use context_loop_core::similarity::{BruteForceCosine, SimilarityIndex, VectorCandidate};
use context_loop_core::store::{
    ContextItemRecord, ContextStore, EmbeddingRecord, SearchHit, DEFAULT_CANDIDATE_POOL,
};

/// SQLite implementation of the [`ContextStore`] trait.
pub struct SqliteContextStore {
    pool: SqlitePool,
    candidate_pool: usize,
    index: Box<dyn SimilarityIndex>,
}

impl SqliteContextStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_candidate_pool(pool, DEFAULT_CANDIDATE_POOL)
    }

    pub fn with_candidate_pool(pool: SqlitePool, candidate_pool: usize) -> Self {
        Self {
            pool,
            candidate_pool: candidate_pool.max(1),
            index: Box::new(BruteForceCosine),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

const ITEM_COLUMNS: &str =
    "id, context_id, workspace_id, type, title, summary, data, created_at, updated_at";

fn row_to_item(row: &SqliteRow) -> Result<ContextItemRecord> {
    let kind: String = row.get("type");
    let data: String = row.get("data");
    Ok(ContextItemRecord {
        id: row.get("id"),
        context_id: row.get("context_id"),
        workspace_id: row.get("workspace_id"),
        kind: kind.parse()?,
        title: row.get("title"),
        summary: row.get("summary"),
        data: serde_json::from_str(&data).context("corrupt context item data")?,
        created_at: from_millis(row.get("created_at")),
        updated_at: from_millis(row.get("updated_at")),
    })
}

#[async_trait]
impl ContextStore for SqliteContextStore {
    async fn save(&self, ctx: &ContextObject) -> Result<ContextItemRecord> {
        if ctx.workspace_id().is_empty() {
            bail!("refusing to cache context {} without a workspace id", ctx.id());
        }
        let fresh = ContextItemRecord::from_context(ctx)?;

        sqlx::query(
            r#"
            INSERT INTO context_items (id, context_id, workspace_id, type, title, summary,
                                       data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(workspace_id, type, context_id) DO UPDATE SET
                title = excluded.title,
                summary = excluded.summary,
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&fresh.id)
        .bind(&fresh.context_id)
        .bind(&fresh.workspace_id)
        .bind(fresh.kind.as_str())
        .bind(&fresh.title)
        .bind(&fresh.summary)
        .bind(fresh.data.to_string())
        .bind(to_millis(fresh.created_at))
        .bind(to_millis(fresh.updated_at))
        .execute(&self.pool)
        .await?;

        self.get(&fresh.context_id, fresh.kind, &fresh.workspace_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("context item vanished after upsert"))
    }

    async fn get(
        &self,
        context_id: &str,
        kind: ContextKind,
        workspace_id: &str,
    ) -> Result<Option<ContextItemRecord>> {
        let sql = format!(
            "SELECT {} FROM context_items WHERE workspace_id = ? AND type = ? AND context_id = ?",
            ITEM_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(workspace_id)
            .bind(kind.as_str())
            .bind(context_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn get_item(
        &self,
        item_id: &str,
        workspace_id: &str,
    ) -> Result<Option<ContextItemRecord>> {
        let sql = format!(
            "SELECT {} FROM context_items WHERE workspace_id = ? AND id = ?",
            ITEM_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(workspace_id)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn list(
        &self,
        workspace_id: &str,
        kind: Option<ContextKind>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ContextItemRecord>> {
        let sql = format!(
            "SELECT {} FROM context_items
             WHERE workspace_id = ? AND (? IS NULL OR type = ?)
             ORDER BY updated_at DESC, id ASC
             LIMIT ? OFFSET ?",
            ITEM_COLUMNS
        );
        let kind = kind.map(|k| k.as_str());
        let rows = sqlx::query(&sql)
            .bind(workspace_id)
            .bind(kind)
            .bind(kind)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn list_ids_after(
        &self,
        workspace_id: &str,
        after_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM context_items
             WHERE workspace_id = ? AND (? IS NULL OR id > ?)
             ORDER BY id ASC
             LIMIT ?",
        )
        .bind(workspace_id)
        .bind(after_id)
        .bind(after_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn count(&self, workspace_id: &str, kind: Option<ContextKind>) -> Result<usize> {
        let kind = kind.map(|k| k.as_str());
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM context_items WHERE workspace_id = ? AND (? IS NULL OR type = ?)",
        )
        .bind(workspace_id)
        .bind(kind)
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;
        Ok(n as usize)
    }

    async fn delete(&self, item_id: &str, workspace_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let owned: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM context_items WHERE workspace_id = ? AND id = ?",
        )
        .bind(workspace_id)
        .bind(item_id)
        .fetch_one(&mut *tx)
        .await?;
        if owned == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM context_embeddings WHERE workspace_id = ? AND context_item_id = ?")
            .bind(workspace_id)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM context_summaries WHERE workspace_id = ? AND context_item_id = ?")
            .bind(workspace_id)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM context_items WHERE workspace_id = ? AND id = ?")
            .bind(workspace_id)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn save_embedding(
        &self,
        item_id: &str,
        vector: &[f32],
        workspace_id: &str,
        model: &str,
        content_hash: &str,
    ) -> Result<()> {
        if self.get_item(item_id, workspace_id).await?.is_none() {
            bail!(
                "context item {} not found in workspace {}",
                item_id,
                workspace_id
            );
        }

        sqlx::query(
            r#"
            INSERT INTO context_embeddings (context_item_id, workspace_id, model, dims,
                                            content_hash, vector, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(context_item_id) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                content_hash = excluded.content_hash,
                vector = excluded.vector,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(item_id)
        .bind(workspace_id)
        .bind(model)
        .bind(vector.len() as i64)
        .bind(content_hash)
        .bind(vec_to_blob(vector))
        .bind(to_millis(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_embedding(
        &self,
        item_id: &str,
        workspace_id: &str,
    ) -> Result<Option<EmbeddingRecord>> {
        let row = sqlx::query(
            r#"
            SELECT context_item_id, workspace_id, model, content_hash, vector, updated_at
            FROM context_embeddings
            WHERE workspace_id = ? AND context_item_id = ?
            "#,
        )
        .bind(workspace_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let blob: Vec<u8> = r.get("vector");
            EmbeddingRecord {
                context_item_id: r.get("context_item_id"),
                vector: blob_to_vec(&blob),
                workspace_id: r.get("workspace_id"),
                model: r.get("model"),
                content_hash: r.get("content_hash"),
                updated_at: from_millis(r.get("updated_at")),
            }
        }))
    }

    async fn search(
        &self,
        workspace_id: &str,
        vector: &[f32],
        kind: Option<ContextKind>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        if limit == 0 || vector.is_empty() {
            return Ok(Vec::new());
        }

        let kind = kind.map(|k| k.as_str());
        let rows = sqlx::query(
            r#"
            SELECT e.context_item_id, e.vector
            FROM context_embeddings e
            JOIN context_items i ON i.id = e.context_item_id
            WHERE e.workspace_id = ? AND i.workspace_id = ?
              AND (? IS NULL OR i.type = ?)
            ORDER BY e.updated_at DESC, i.id ASC
            LIMIT ?
            "#,
        )
        .bind(workspace_id)
        .bind(workspace_id)
        .bind(kind)
        .bind(kind)
        .bind(self.candidate_pool as i64)
        .fetch_all(&self.pool)
        .await?;

        let candidates: Vec<VectorCandidate> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                VectorCandidate {
                    item_id: row.get("context_item_id"),
                    vector: blob_to_vec(&blob),
                }
            })
            .collect();

        let mut hits = Vec::new();
        for scored in self.index.top_k(&candidates, vector, limit) {
            match self.get_item(&scored.item_id, workspace_id).await {
                Ok(Some(record)) => hits.push(SearchHit {
                    record,
                    score: scored.score,
                }),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(workspace_id, item_id = %scored.item_id, error = %e, "skipping unreadable search hit");
                }
            }
        }
        Ok(hits)
    }

    async fn save_summary(&self, item_id: &str, summary: &str, workspace_id: &str) -> Result<()> {
        if self.get_item(item_id, workspace_id).await?.is_none() {
            bail!(
                "context item {} not found in workspace {}",
                item_id,
                workspace_id
            );
        }

        sqlx::query(
            r#"
            INSERT INTO context_summaries (context_item_id, workspace_id, summary, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(context_item_id) DO UPDATE SET
                summary = excluded.summary,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(item_id)
        .bind(workspace_id)
        .bind(summary)
        .bind(to_millis(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_summary(&self, item_id: &str, workspace_id: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT i.summary AS inline_summary, s.summary AS override_summary
            FROM context_items i
            LEFT JOIN context_summaries s
                   ON s.context_item_id = i.id AND s.workspace_id = i.workspace_id
            WHERE i.workspace_id = ? AND i.id = ?
            "#,
        )
        .bind(workspace_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let over: Option<String> = r.get("override_summary");
            over.unwrap_or_else(|| r.get("inline_summary"))
        }))
    }
}
