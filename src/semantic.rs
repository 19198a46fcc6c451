//! Embedding and semantic search over cached context items.
//!
//! [`SemanticIndex`] turns context items into embedding text, calls the
//! configured [`EmbeddingProvider`], stores the vectors through the
//! [`ContextStore`], and answers nearest-neighbour queries. It also runs the
//! offline backfill that re-embeds a whole workspace in throttled batches.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use context_loop_core::embedding::{content_hash, EmbeddingProvider};
use context_loop_core::embedding_text::build_embedding_text;
use context_loop_core::models::ContextKind;
use context_loop_core::store::ContextStore;

use crate::config::BackfillConfig;
use crate::error::{LoopError, LoopResult};

/// Most per-item errors a [`BackfillReport`] keeps.
pub const MAX_REPORTED_ERRORS: usize = 100;

/// A ranked semantic-search result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticHit {
    pub item_id: String,
    pub context_id: String,
    pub kind: ContextKind,
    pub title: String,
    /// Override summary if one exists, else the item's inline summary.
    pub summary: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedOutcome {
    pub item_id: String,
    pub model: String,
    pub dims: usize,
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillError {
    pub item_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<BackfillError>,
}

impl BackfillReport {
    fn record_failure(&mut self, item_id: &str, message: String) {
        self.failed += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(BackfillError {
                item_id: item_id.to_string(),
                message,
            });
        }
    }
}

pub struct SemanticIndex {
    store: Arc<dyn ContextStore>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl SemanticIndex {
    pub fn new(store: Arc<dyn ContextStore>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, provider }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed one text. Empty input is rejected; a vector whose length
    /// differs from the configured dimensionality is only warned about.
    pub async fn embed(&self, text: &str) -> LoopResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(LoopError::validation("text to embed must not be empty"));
        }

        let mut vectors = self
            .provider
            .embed(&[text.to_string()])
            .await
            .map_err(|e| {
                tracing::warn!(model = self.provider.model_name(), error = %e, "embedding call failed");
                LoopError::Embedding(e.to_string())
            })?;
        if vectors.is_empty() {
            return Err(LoopError::Embedding("provider returned no vectors".to_string()));
        }
        let vector = vectors.swap_remove(0);

        let expected = self.provider.dims();
        if expected > 0 && vector.len() != expected {
            tracing::warn!(
                model = self.provider.model_name(),
                expected,
                actual = vector.len(),
                "embedding dimension mismatch"
            );
        }
        Ok(vector)
    }

    /// Rebuild the embedding for a stored item and save it with its content
    /// hash. The item must belong to `workspace_id`.
    pub async fn embed_context_item(
        &self,
        workspace_id: &str,
        item_id: &str,
    ) -> LoopResult<EmbedOutcome> {
        let record = self
            .store
            .get_item(item_id, workspace_id)
            .await?
            .ok_or_else(|| LoopError::NotFound(format!("context item {}", item_id)))?;
        if record.workspace_id != workspace_id {
            tracing::error!(workspace_id, item_id, "context item crossed workspace boundary");
            return Err(LoopError::TenantMismatch {
                entity: format!("context item {}", item_id),
            });
        }

        let ctx = record.context()?;
        let text = build_embedding_text(&ctx);
        let hash = content_hash(&text);
        let vector = self.embed(&text).await?;

        self.store
            .save_embedding(
                &record.id,
                &vector,
                workspace_id,
                self.provider.model_name(),
                &hash,
            )
            .await?;

        tracing::debug!(workspace_id, item_id, dims = vector.len(), "embedded context item");
        Ok(EmbedOutcome {
            item_id: record.id,
            model: self.provider.model_name().to_string(),
            dims: vector.len(),
            content_hash: hash,
        })
    }

    pub async fn search_similar(
        &self,
        workspace_id: &str,
        query: &str,
        kind: Option<ContextKind>,
        limit: usize,
    ) -> LoopResult<Vec<SemanticHit>> {
        let vector = self.embed(query).await?;
        let hits = self.store.search(workspace_id, &vector, kind, limit).await?;

        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            if hit.record.workspace_id != workspace_id {
                tracing::error!(workspace_id, item_id = %hit.record.id, "discarding foreign search hit");
                continue;
            }
            let summary = match self.store.get_summary(&hit.record.id, workspace_id).await {
                Ok(Some(summary)) => summary,
                Ok(None) => hit.record.summary.clone(),
                Err(e) => {
                    tracing::warn!(workspace_id, item_id = %hit.record.id, error = %e, "summary lookup failed; using inline summary");
                    hit.record.summary.clone()
                }
            };
            out.push(SemanticHit {
                item_id: hit.record.id,
                context_id: hit.record.context_id,
                kind: hit.record.kind,
                title: hit.record.title,
                summary,
                score: hit.score,
            });
        }
        Ok(out)
    }

    /// Re-embed every cached item in `workspace_id`.
    ///
    /// Item ids are fetched `page_size` at a time in id order, so contexts
    /// re-cached while the job runs are neither skipped nor repeated. After
    /// every `batch_size` items the job sleeps `delay_ms`. A failing item is
    /// recorded and the job moves on.
    pub async fn backfill(
        &self,
        workspace_id: &str,
        config: &BackfillConfig,
    ) -> LoopResult<BackfillReport> {
        let page_size = config.page_size.max(1);
        let batch_size = config.batch_size.max(1);
        let delay = Duration::from_millis(config.delay_ms);

        let mut report = BackfillReport {
            total: self.store.count(workspace_id, None).await?,
            ..Default::default()
        };
        tracing::info!(workspace_id, total = report.total, "starting embedding backfill");

        let mut cursor: Option<String> = None;
        let mut since_pause = 0;
        loop {
            let page = self
                .store
                .list_ids_after(workspace_id, cursor.as_deref(), page_size)
                .await?;
            if page.is_empty() {
                break;
            }
            cursor = page.last().cloned();

            for item_id in &page {
                if since_pause == batch_size {
                    since_pause = 0;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                since_pause += 1;

                report.processed += 1;
                match self.embed_context_item(workspace_id, item_id).await {
                    Ok(_) => report.succeeded += 1,
                    Err(e) => {
                        tracing::warn!(workspace_id, item_id = %item_id, error = %e, "backfill item failed");
                        report.record_failure(item_id, e.to_string());
                    }
                }
            }

            if page.len() < page_size {
                break;
            }
        }

        tracing::info!(
            workspace_id,
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "embedding backfill finished"
        );
        Ok(report)
    }
}
