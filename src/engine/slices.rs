//! Structured slices: flat [`StructuredContext`] lists handed to the prompt
//! as JSON blocks.

use anyhow::Result;

use context_loop_core::api::Anchors;
use context_loop_core::domain::{PageFilter, TaskFilter};
use context_loop_core::structured::StructuredContext;

use super::{own, retain_own, ContextEngine};

/// Most records any one slice contributes.
pub const SLICE_LIMIT: usize = 25;

/// Epics and tasks under one project.
#[derive(Debug, Clone, Default)]
pub struct ProjectSlice {
    pub epics: Vec<StructuredContext>,
    pub tasks: Vec<StructuredContext>,
}

impl ContextEngine {
    /// Active projects (planning or in progress). Archived, on-hold and
    /// completed projects are excluded.
    pub async fn active_projects_slice(&self, workspace_id: &str) -> Result<Vec<StructuredContext>> {
        let projects = retain_own(self.domain.projects(workspace_id).await?, workspace_id, "project");
        Ok(projects
            .iter()
            .filter(|p| p.status.is_active())
            .take(SLICE_LIMIT)
            .map(StructuredContext::from)
            .collect())
    }

    /// Open tasks, the user's own first, then by recency.
    pub async fn active_tasks_slice(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Vec<StructuredContext>> {
        let mut tasks = retain_own(
            self.domain.tasks(workspace_id, &TaskFilter::default()).await?,
            workspace_id,
            "task",
        );
        tasks.retain(|t| !t.status.is_completed());
        tasks.sort_by_key(|t| t.assignee_id.as_deref() != Some(user_id));
        Ok(tasks
            .iter()
            .take(SLICE_LIMIT)
            .map(StructuredContext::from)
            .collect())
    }

    /// Epics and tasks of one project. Empty when the project is not in
    /// this workspace.
    pub async fn project_slice(&self, workspace_id: &str, project_id: &str) -> Result<ProjectSlice> {
        if own(
            self.domain.project(workspace_id, project_id).await?,
            workspace_id,
            "project",
        )
        .is_none()
        {
            return Ok(ProjectSlice::default());
        }

        let epics = retain_own(
            self.domain.epics(workspace_id, Some(project_id)).await?,
            workspace_id,
            "epic",
        );
        let filter = TaskFilter {
            project_id: Some(project_id.to_string()),
            limit: Some(SLICE_LIMIT),
            ..Default::default()
        };
        let tasks = retain_own(self.domain.tasks(workspace_id, &filter).await?, workspace_id, "task");

        Ok(ProjectSlice {
            epics: epics.iter().take(SLICE_LIMIT).map(StructuredContext::from).collect(),
            tasks: tasks.iter().map(StructuredContext::from).collect(),
        })
    }

    /// Project the anchors point into: a page's project, the anchored
    /// project, or a task's project, in that order.
    pub async fn anchored_project_id(
        &self,
        workspace_id: &str,
        anchors: &Anchors,
    ) -> Result<Option<String>> {
        if let Some(page_id) = anchors.page() {
            if let Some(page) = own(self.domain.page(workspace_id, page_id).await?, workspace_id, "page") {
                if page.project_id.is_some() {
                    return Ok(page.project_id);
                }
            }
        }
        if let Some(project_id) = anchors.project() {
            return Ok(Some(project_id.to_string()));
        }
        if let Some(task_id) = anchors.task() {
            let task = own(self.domain.task(workspace_id, task_id).await?, workspace_id, "task");
            return Ok(task.and_then(|t| t.project_id));
        }
        Ok(None)
    }

    /// The user's personal, non-archived documents.
    pub async fn personal_docs_slice(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Vec<StructuredContext>> {
        let filter = PageFilter {
            owner_id: Some(user_id.to_string()),
            personal_only: true,
            include_archived: false,
            limit: Some(SLICE_LIMIT),
        };
        let pages = retain_own(self.domain.pages(workspace_id, &filter).await?, workspace_id, "page");
        Ok(pages.iter().map(StructuredContext::from).collect())
    }

    pub async fn people_slice(&self, workspace_id: &str) -> Result<Vec<StructuredContext>> {
        let positions = retain_own(
            self.domain.org_positions(workspace_id).await?,
            workspace_id,
            "org position",
        );
        Ok(positions
            .iter()
            .take(SLICE_LIMIT)
            .map(StructuredContext::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use context_loop_core::domain::memory::InMemoryDomain;
    use context_loop_core::domain::{ProjectRow, TaskRow};
    use context_loop_core::models::{Priority, ProjectStatus, TaskStatus};
    use context_loop_core::store::memory::InMemoryContextStore;

    use crate::config::RetrievalConfig;

    fn task(id: &str, assignee: &str, status: TaskStatus, minutes_ago: i64) -> TaskRow {
        TaskRow {
            id: id.to_string(),
            workspace_id: "ws1".to_string(),
            project_id: None,
            epic_id: None,
            title: id.to_string(),
            description: None,
            status,
            priority: Priority::Low,
            assignee_id: Some(assignee.to_string()),
            depends_on: vec![],
            tags: vec![],
            due_date: None,
            updated_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn engine(domain: InMemoryDomain) -> ContextEngine {
        ContextEngine::new(
            Arc::new(domain),
            Arc::new(InMemoryContextStore::new()),
            RetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_own_tasks_come_first_and_done_is_dropped() {
        let domain = InMemoryDomain::new();
        domain.insert_task(task("theirs-new", "u2", TaskStatus::Todo, 1));
        domain.insert_task(task("mine-old", "u1", TaskStatus::InProgress, 30));
        domain.insert_task(task("mine-done", "u1", TaskStatus::Done, 2));
        let engine = engine(domain);

        let slice = engine.active_tasks_slice("ws1", "u1").await.unwrap();
        let ids: Vec<&str> = slice.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["mine-old", "theirs-new"]);
    }

    #[tokio::test]
    async fn test_archived_projects_are_not_active() {
        let domain = InMemoryDomain::new();
        for (id, status) in [
            ("a", ProjectStatus::Active),
            ("b", ProjectStatus::Archived),
            ("c", ProjectStatus::Planning),
        ] {
            domain.insert_project(ProjectRow {
                id: id.to_string(),
                workspace_id: "ws1".to_string(),
                name: id.to_string(),
                description: None,
                status,
                tags: vec![],
                owner_id: None,
                due_date: None,
                updated_at: Utc::now(),
            });
        }
        let engine = engine(domain);

        let slice = engine.active_projects_slice("ws1").await.unwrap();
        let mut ids: Vec<&str> = slice.iter().map(|s| s.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_project_slice_of_unknown_project_is_empty() {
        let engine = engine(InMemoryDomain::new());
        let slice = engine.project_slice("ws1", "nope").await.unwrap();
        assert!(slice.epics.is_empty() && slice.tasks.is_empty());
    }
}
