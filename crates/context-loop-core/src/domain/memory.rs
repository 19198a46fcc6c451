//! In-memory [`DomainSource`] for tests and embedded hosts.
//!
//! Rows live in `Vec`s behind `std::sync::RwLock`. Every query filters by
//! `workspace_id` before anything else, mirroring what the SQL
//! implementation does with its `WHERE workspace_id = ?` clauses.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::{
    ActivityRow, DomainSource, EpicRow, OrgPositionRow, PageFilter, PageRow, ProjectRow, TaskFilter,
    TaskRow, WorkspaceRow,
};

#[derive(Default)]
struct Tables {
    workspaces: Vec<WorkspaceRow>,
    pages: Vec<PageRow>,
    projects: Vec<ProjectRow>,
    tasks: Vec<TaskRow>,
    epics: Vec<EpicRow>,
    positions: Vec<OrgPositionRow>,
    activity: Vec<ActivityRow>,
}

/// In-memory domain data.
#[derive(Default)]
pub struct InMemoryDomain {
    tables: RwLock<Tables>,
}

fn upsert_by_id<T>(rows: &mut Vec<T>, row: T, id_of: impl Fn(&T) -> &str) {
    let id = id_of(&row).to_string();
    rows.retain(|r| id_of(r) != id);
    rows.push(row);
}

fn take_limit<T>(mut rows: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

impl InMemoryDomain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_workspace(&self, row: WorkspaceRow) {
        upsert_by_id(&mut self.tables.write().unwrap().workspaces, row, |r| r.id.as_str());
    }

    pub fn insert_page(&self, row: PageRow) {
        upsert_by_id(&mut self.tables.write().unwrap().pages, row, |r| r.id.as_str());
    }

    pub fn insert_project(&self, row: ProjectRow) {
        upsert_by_id(&mut self.tables.write().unwrap().projects, row, |r| r.id.as_str());
    }

    pub fn insert_task(&self, row: TaskRow) {
        upsert_by_id(&mut self.tables.write().unwrap().tasks, row, |r| r.id.as_str());
    }

    pub fn insert_epic(&self, row: EpicRow) {
        upsert_by_id(&mut self.tables.write().unwrap().epics, row, |r| r.id.as_str());
    }

    pub fn insert_position(&self, row: OrgPositionRow) {
        upsert_by_id(&mut self.tables.write().unwrap().positions, row, |r| r.id.as_str());
    }

    pub fn insert_activity(&self, row: ActivityRow) {
        upsert_by_id(&mut self.tables.write().unwrap().activity, row, |r| r.id.as_str());
    }
}

#[async_trait]
impl DomainSource for InMemoryDomain {
    async fn workspace(&self, workspace_id: &str) -> Result<Option<WorkspaceRow>> {
        let t = self.tables.read().unwrap();
        Ok(t.workspaces.iter().find(|w| w.id == workspace_id).cloned())
    }

    async fn page(&self, workspace_id: &str, page_id: &str) -> Result<Option<PageRow>> {
        let t = self.tables.read().unwrap();
        Ok(t.pages
            .iter()
            .find(|p| p.workspace_id == workspace_id && p.id == page_id)
            .cloned())
    }

    async fn pages(&self, workspace_id: &str, filter: &PageFilter) -> Result<Vec<PageRow>> {
        let t = self.tables.read().unwrap();
        let mut rows: Vec<PageRow> = t
            .pages
            .iter()
            .filter(|p| p.workspace_id == workspace_id)
            .filter(|p| filter.include_archived || !p.archived)
            .filter(|p| !filter.personal_only || p.is_personal)
            .filter(|p| match &filter.owner_id {
                Some(owner) => p.owner_id.as_deref() == Some(owner.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(take_limit(rows, filter.limit))
    }

    async fn project(&self, workspace_id: &str, project_id: &str) -> Result<Option<ProjectRow>> {
        let t = self.tables.read().unwrap();
        Ok(t.projects
            .iter()
            .find(|p| p.workspace_id == workspace_id && p.id == project_id)
            .cloned())
    }

    async fn projects(&self, workspace_id: &str) -> Result<Vec<ProjectRow>> {
        let t = self.tables.read().unwrap();
        let mut rows: Vec<ProjectRow> = t
            .projects
            .iter()
            .filter(|p| p.workspace_id == workspace_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn task(&self, workspace_id: &str, task_id: &str) -> Result<Option<TaskRow>> {
        let t = self.tables.read().unwrap();
        Ok(t.tasks
            .iter()
            .find(|r| r.workspace_id == workspace_id && r.id == task_id)
            .cloned())
    }

    async fn tasks(&self, workspace_id: &str, filter: &TaskFilter) -> Result<Vec<TaskRow>> {
        let t = self.tables.read().unwrap();
        let matches = |want: &Option<String>, have: &Option<String>| match want {
            Some(w) => have.as_deref() == Some(w.as_str()),
            None => true,
        };
        let mut rows: Vec<TaskRow> = t
            .tasks
            .iter()
            .filter(|r| r.workspace_id == workspace_id)
            .filter(|r| matches(&filter.project_id, &r.project_id))
            .filter(|r| matches(&filter.epic_id, &r.epic_id))
            .filter(|r| matches(&filter.assignee_id, &r.assignee_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(take_limit(rows, filter.limit))
    }

    async fn epic(&self, workspace_id: &str, epic_id: &str) -> Result<Option<EpicRow>> {
        let t = self.tables.read().unwrap();
        Ok(t.epics
            .iter()
            .find(|e| e.workspace_id == workspace_id && e.id == epic_id)
            .cloned())
    }

    async fn epics(&self, workspace_id: &str, project_id: Option<&str>) -> Result<Vec<EpicRow>> {
        let t = self.tables.read().unwrap();
        let mut rows: Vec<EpicRow> = t
            .epics
            .iter()
            .filter(|e| e.workspace_id == workspace_id)
            .filter(|e| project_id.map_or(true, |p| e.project_id.as_deref() == Some(p)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn org_positions(&self, workspace_id: &str) -> Result<Vec<OrgPositionRow>> {
        let t = self.tables.read().unwrap();
        let mut rows: Vec<OrgPositionRow> = t
            .positions
            .iter()
            .filter(|p| p.workspace_id == workspace_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn activity(&self, workspace_id: &str, limit: usize) -> Result<Vec<ActivityRow>> {
        let t = self.tables.read().unwrap();
        let mut rows: Vec<ActivityRow> = t
            .activity
            .iter()
            .filter(|a| a.workspace_id == workspace_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(a.id.cmp(&b.id)));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProjectStatus;
    use chrono::{Duration, Utc};

    fn project(id: &str, ws: &str, minutes_ago: i64) -> ProjectRow {
        ProjectRow {
            id: id.to_string(),
            workspace_id: ws.to_string(),
            name: format!("Project {}", id),
            description: None,
            status: ProjectStatus::Active,
            tags: vec![],
            owner_id: None,
            due_date: None,
            updated_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_queries_never_cross_workspaces() {
        let domain = InMemoryDomain::new();
        domain.insert_project(project("p1", "ws1", 5));
        domain.insert_project(project("p2", "ws2", 1));

        let rows = domain.projects("ws1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "p1");
        assert!(domain.project("ws1", "p2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_projects_newest_first() {
        let domain = InMemoryDomain::new();
        domain.insert_project(project("old", "ws1", 60));
        domain.insert_project(project("new", "ws1", 1));
        let ids: Vec<String> = domain
            .projects("ws1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }
}
