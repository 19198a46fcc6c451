//! In-memory [`ContextStore`] implementation for testing and embedded hosts.
//!
//! Uses `HashMap`s behind `std::sync::RwLock` for thread safety. Vector
//! search fetches the workspace's most recently embedded vectors (up to the
//! candidate-pool cap) and ranks them through a [`SimilarityIndex`].

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{ContextKind, ContextObject};
use crate::similarity::{BruteForceCosine, SimilarityIndex, VectorCandidate};

use super::{
    ContextItemRecord, ContextStore, EmbeddingRecord, SearchHit, SummaryRecord,
    DEFAULT_CANDIDATE_POOL,
};

/// In-memory store keyed by item id.
pub struct InMemoryContextStore {
    items: RwLock<HashMap<String, ContextItemRecord>>,
    vectors: RwLock<HashMap<String, EmbeddingRecord>>,
    summaries: RwLock<HashMap<String, SummaryRecord>>,
    candidate_pool: usize,
    index: Box<dyn SimilarityIndex>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::with_candidate_pool(DEFAULT_CANDIDATE_POOL)
    }

    pub fn with_candidate_pool(candidate_pool: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            vectors: RwLock::new(HashMap::new()),
            summaries: RwLock::new(HashMap::new()),
            candidate_pool: candidate_pool.max(1),
            index: Box::new(BruteForceCosine),
        }
    }

    /// Swap the ranking strategy.
    pub fn with_index(mut self, index: Box<dyn SimilarityIndex>) -> Self {
        self.index = index;
        self
    }

    fn scoped_item(&self, item_id: &str, workspace_id: &str) -> Option<ContextItemRecord> {
        let items = self.items.read().unwrap();
        items
            .get(item_id)
            .filter(|r| r.workspace_id == workspace_id)
            .cloned()
    }
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new()
    }
}

fn recency_order(a: &ContextItemRecord, b: &ContextItemRecord) -> std::cmp::Ordering {
    b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn save(&self, ctx: &ContextObject) -> Result<ContextItemRecord> {
        if ctx.workspace_id().is_empty() {
            bail!("refusing to cache context {} without a workspace id", ctx.id());
        }
        let mut fresh = ContextItemRecord::from_context(ctx)?;
        let mut items = self.items.write().unwrap();
        let existing = items
            .values()
            .find(|r| {
                r.workspace_id == fresh.workspace_id
                    && r.kind == fresh.kind
                    && r.context_id == fresh.context_id
            })
            .map(|r| (r.id.clone(), r.created_at));
        if let Some((id, created_at)) = existing {
            fresh.id = id;
            fresh.created_at = created_at;
        }
        items.insert(fresh.id.clone(), fresh.clone());
        Ok(fresh)
    }

    async fn get(
        &self,
        context_id: &str,
        kind: ContextKind,
        workspace_id: &str,
    ) -> Result<Option<ContextItemRecord>> {
        let items = self.items.read().unwrap();
        Ok(items
            .values()
            .find(|r| r.workspace_id == workspace_id && r.kind == kind && r.context_id == context_id)
            .cloned())
    }

    async fn get_item(
        &self,
        item_id: &str,
        workspace_id: &str,
    ) -> Result<Option<ContextItemRecord>> {
        Ok(self.scoped_item(item_id, workspace_id))
    }

    async fn list(
        &self,
        workspace_id: &str,
        kind: Option<ContextKind>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ContextItemRecord>> {
        let items = self.items.read().unwrap();
        let mut rows: Vec<ContextItemRecord> = items
            .values()
            .filter(|r| r.workspace_id == workspace_id)
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .cloned()
            .collect();
        rows.sort_by(recency_order);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn list_ids_after(
        &self,
        workspace_id: &str,
        after_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>> {
        let items = self.items.read().unwrap();
        let mut ids: Vec<String> = items
            .values()
            .filter(|r| r.workspace_id == workspace_id)
            .filter(|r| after_id.map_or(true, |after| r.id.as_str() > after))
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids.truncate(limit);
        Ok(ids)
    }

    async fn count(&self, workspace_id: &str, kind: Option<ContextKind>) -> Result<usize> {
        let items = self.items.read().unwrap();
        Ok(items
            .values()
            .filter(|r| r.workspace_id == workspace_id)
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .count())
    }

    async fn delete(&self, item_id: &str, workspace_id: &str) -> Result<bool> {
        let mut items = self.items.write().unwrap();
        let owned = items
            .get(item_id)
            .map_or(false, |r| r.workspace_id == workspace_id);
        if !owned {
            return Ok(false);
        }
        items.remove(item_id);
        self.vectors.write().unwrap().remove(item_id);
        self.summaries.write().unwrap().remove(item_id);
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
        if self.scoped_item(item_id, workspace_id).is_none() {
            bail!(
                "context item {} not found in workspace {}",
                item_id,
                workspace_id
            );
        }
        self.vectors.write().unwrap().insert(
            item_id.to_string(),
            EmbeddingRecord {
                context_item_id: item_id.to_string(),
                vector: vector.to_vec(),
                workspace_id: workspace_id.to_string(),
                model: model.to_string(),
                content_hash: content_hash.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_embedding(
        &self,
        item_id: &str,
        workspace_id: &str,
    ) -> Result<Option<EmbeddingRecord>> {
        let vecs = self.vectors.read().unwrap();
        Ok(vecs
            .get(item_id)
            .filter(|v| v.workspace_id == workspace_id)
            .cloned())
    }

    async fn search(
        &self,
        workspace_id: &str,
        vector: &[f32],
        kind: Option<ContextKind>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let items = self.items.read().unwrap();
        let vecs = self.vectors.read().unwrap();

        let mut pool: Vec<(&EmbeddingRecord, &ContextItemRecord)> = vecs
            .values()
            .filter(|v| v.workspace_id == workspace_id)
            .filter_map(|v| items.get(&v.context_item_id).map(|item| (v, item)))
            .filter(|(_, item)| item.workspace_id == workspace_id)
            .filter(|(_, item)| kind.map_or(true, |k| item.kind == k))
            .collect();
        pool.sort_by(|a, b| {
            b.0.updated_at
                .cmp(&a.0.updated_at)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        pool.truncate(self.candidate_pool);

        let candidates: Vec<VectorCandidate> = pool
            .iter()
            .map(|(v, item)| VectorCandidate {
                item_id: item.id.clone(),
                vector: v.vector.clone(),
            })
            .collect();

        Ok(self
            .index
            .top_k(&candidates, vector, limit)
            .into_iter()
            .filter_map(|scored| {
                items.get(&scored.item_id).map(|record| SearchHit {
                    record: record.clone(),
                    score: scored.score,
                })
            })
            .collect())
    }

    async fn save_summary(&self, item_id: &str, summary: &str, workspace_id: &str) -> Result<()> {
        if self.scoped_item(item_id, workspace_id).is_none() {
            bail!(
                "context item {} not found in workspace {}",
                item_id,
                workspace_id
            );
        }
        self.summaries.write().unwrap().insert(
            item_id.to_string(),
            SummaryRecord {
                context_item_id: item_id.to_string(),
                summary: summary.to_string(),
                workspace_id: workspace_id.to_string(),
            },
        );
        Ok(())
    }

    async fn get_summary(&self, item_id: &str, workspace_id: &str) -> Result<Option<String>> {
        let item = match self.scoped_item(item_id, workspace_id) {
            Some(item) => item,
            None => return Ok(None),
        };
        let summaries = self.summaries.read().unwrap();
        Ok(Some(
            summaries
                .get(item_id)
                .filter(|s| s.workspace_id == workspace_id)
                .map(|s| s.summary.clone())
                .unwrap_or(item.summary),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ContextHeader, PageContext, ProjectContext, ProjectStatus, TaskCounts,
    };

    fn page(id: &str, ws: &str) -> ContextObject {
        ContextObject::Page(PageContext {
            header: ContextHeader::new(id, ws),
            title: format!("Page {}", id),
            content: "Body text".to_string(),
            excerpt: "Body text".to_string(),
            tags: vec!["docs".to_string()],
            breadcrumbs: vec![],
            related_docs: vec![],
            project_id: None,
            owner_id: None,
            is_personal: false,
            updated_at: Utc::now(),
        })
    }

    fn project(id: &str, ws: &str) -> ContextObject {
        ContextObject::Project(ProjectContext {
            header: ContextHeader::new(id, ws),
            name: format!("Project {}", id),
            description: None,
            status: ProjectStatus::Active,
            tags: vec![],
            owner_id: None,
            due_date: None,
            task_counts: TaskCounts::default(),
            epics: vec![],
            open_tasks: vec![],
        })
    }

    #[tokio::test]
    async fn test_save_get_roundtrip() {
        let store = InMemoryContextStore::new();
        let ctx = page("pg1", "ws1");
        store.save(&ctx).await.unwrap();

        let rec = store
            .get("pg1", ContextKind::Page, "ws1")
            .await
            .unwrap()
            .expect("record");
        assert_eq!(rec.context().unwrap(), ctx);
        assert_eq!(rec.title, "Page pg1");
    }

    #[tokio::test]
    async fn test_save_twice_upserts() {
        let store = InMemoryContextStore::new();
        let first = store.save(&page("pg1", "ws1")).await.unwrap();
        let second = store.save(&page("pg1", "ws1")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(store.count("ws1", None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_context_id_in_other_workspace_is_separate() {
        let store = InMemoryContextStore::new();
        store.save(&page("pg1", "ws1")).await.unwrap();
        store.save(&page("pg1", "ws2")).await.unwrap();
        assert_eq!(store.count("ws1", None).await.unwrap(), 1);
        assert_eq!(store.count("ws2", None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reads_are_workspace_scoped() {
        let store = InMemoryContextStore::new();
        let rec = store.save(&page("pg1", "ws1")).await.unwrap();
        assert!(store.get_item(&rec.id, "ws2").await.unwrap().is_none());
        assert!(store.get("pg1", ContextKind::Page, "ws2").await.unwrap().is_none());
        assert!(!store.delete(&rec.id, "ws2").await.unwrap());
        assert!(store
            .save_embedding(&rec.id, &[1.0], "ws2", "m", "h")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_search_never_crosses_workspaces() {
        let store = InMemoryContextStore::with_candidate_pool(500);
        for i in 0..20 {
            let ws = if i % 2 == 0 { "A" } else { "B" };
            let rec = store.save(&page(&format!("pg{}", i), ws)).await.unwrap();
            store
                .save_embedding(&rec.id, &[1.0, i as f32 * 0.01], ws, "m", "h")
                .await
                .unwrap();
        }
        let hits = store.search("A", &[1.0, 0.0], None, 50).await.unwrap();
        assert_eq!(hits.len(), 10);
        assert!(hits.iter().all(|h| h.record.workspace_id == "A"));
    }

    #[tokio::test]
    async fn test_search_respects_kind_and_pool_cap() {
        let store = InMemoryContextStore::with_candidate_pool(2);
        for i in 0..4 {
            let rec = store.save(&page(&format!("pg{}", i), "ws1")).await.unwrap();
            store
                .save_embedding(&rec.id, &[1.0, 0.0], "ws1", "m", "h")
                .await
                .unwrap();
        }
        let prj = store.save(&project("p1", "ws1")).await.unwrap();
        store
            .save_embedding(&prj.id, &[1.0, 0.0], "ws1", "m", "h")
            .await
            .unwrap();

        let hits = store.search("ws1", &[1.0, 0.0], None, 10).await.unwrap();
        assert_eq!(hits.len(), 2);

        let projects = store
            .search("ws1", &[1.0, 0.0], Some(ContextKind::Project), 10)
            .await
            .unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].record.context_id, "p1");
    }

    #[tokio::test]
    async fn test_summary_falls_back_to_inline() {
        let store = InMemoryContextStore::new();
        let rec = store.save(&project("p1", "ws1")).await.unwrap();
        let inline = store.get_summary(&rec.id, "ws1").await.unwrap().unwrap();
        assert_eq!(inline, rec.summary);

        store
            .save_summary(&rec.id, "Ships the new onboarding", "ws1")
            .await
            .unwrap();
        let over = store.get_summary(&rec.id, "ws1").await.unwrap().unwrap();
        assert_eq!(over, "Ships the new onboarding");
        assert!(store.get_summary(&rec.id, "ws2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_vector_and_summary() {
        let store = InMemoryContextStore::new();
        let rec = store.save(&page("pg1", "ws1")).await.unwrap();
        store
            .save_embedding(&rec.id, &[1.0], "ws1", "m", "h")
            .await
            .unwrap();
        assert!(store.delete(&rec.id, "ws1").await.unwrap());
        assert!(store.get_embedding(&rec.id, "ws1").await.unwrap().is_none());
        assert!(store.search("ws1", &[1.0], None, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_id_paging_is_stable_across_upserts() {
        let store = InMemoryContextStore::new();
        for i in 0..5 {
            store.save(&page(&format!("pg{}", i), "ws1")).await.unwrap();
        }
        store.save(&page("other", "ws2")).await.unwrap();

        let first = store.list_ids_after("ws1", None, 2).await.unwrap();
        assert_eq!(first.len(), 2);

        // Re-caching every page reorders `list` but not the id pages.
        for i in 0..5 {
            store.save(&page(&format!("pg{}", i), "ws1")).await.unwrap();
        }
        let mut seen = first.clone();
        let mut cursor = first.last().cloned();
        loop {
            let next = store
                .list_ids_after("ws1", cursor.as_deref(), 2)
                .await
                .unwrap();
            if next.is_empty() {
                break;
            }
            cursor = next.last().cloned();
            seen.extend(next);
        }

        let mut expected = store.list_ids_after("ws1", None, 100).await.unwrap();
        expected.sort();
        assert_eq!(seen, expected);
        assert_eq!(seen.len(), 5);
    }
}
