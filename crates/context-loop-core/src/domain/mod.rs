//! Read-only access to the product's domain data.
//!
//! The [`DomainSource`] trait is the narrow interface through which the
//! context engine reads workspaces, pages, projects, tasks, epics, org
//! positions, and activity. Every method takes the tenant's `workspace_id`
//! and implementations must filter by it at the query level: a row from
//! another workspace must never be returned, whoever the caller is.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Priority, ProjectStatus, TaskStatus};

/// Implemented by every tenant-owned row so callers can re-check scoping
/// generically.
pub trait Scoped {
    fn workspace_id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub member_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Scoped for WorkspaceRow {
    fn workspace_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRow {
    pub id: String,
    pub workspace_id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub parent_id: Option<String>,
    pub project_id: Option<String>,
    pub owner_id: Option<String>,
    pub is_personal: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub tags: Vec<String>,
    pub owner_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub workspace_id: String,
    pub project_id: Option<String>,
    pub epic_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee_id: Option<String>,
    /// Ids of tasks this task depends on.
    pub depends_on: Vec<String>,
    pub tags: Vec<String>,
    pub due_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicRow {
    pub id: String,
    pub workspace_id: String,
    pub project_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgPositionRow {
    pub id: String,
    pub workspace_id: String,
    pub user_id: String,
    pub name: String,
    pub title: String,
    pub team_id: Option<String>,
    pub team_name: Option<String>,
    pub role_id: Option<String>,
    pub manager_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
    pub id: String,
    pub workspace_id: String,
    pub actor_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub summary: String,
    pub occurred_at: DateTime<Utc>,
}

macro_rules! impl_scoped {
    ($($row:ty),*) => {
        $(impl Scoped for $row {
            fn workspace_id(&self) -> &str {
                &self.workspace_id
            }
        })*
    };
}

impl_scoped!(PageRow, ProjectRow, TaskRow, EpicRow, OrgPositionRow, ActivityRow);

/// Filter for [`DomainSource::pages`].
#[derive(Debug, Clone, Default)]
pub struct PageFilter {
    pub owner_id: Option<String>,
    pub personal_only: bool,
    pub include_archived: bool,
    pub limit: Option<usize>,
}

/// Filter for [`DomainSource::tasks`].
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: Option<String>,
    pub epic_id: Option<String>,
    pub assignee_id: Option<String>,
    pub limit: Option<usize>,
}

/// Workspace-filtered, read-only queries over domain storage.
///
/// List methods return rows most recently updated first.
#[async_trait]
pub trait DomainSource: Send + Sync {
    async fn workspace(&self, workspace_id: &str) -> Result<Option<WorkspaceRow>>;

    async fn page(&self, workspace_id: &str, page_id: &str) -> Result<Option<PageRow>>;

    async fn pages(&self, workspace_id: &str, filter: &PageFilter) -> Result<Vec<PageRow>>;

    async fn project(&self, workspace_id: &str, project_id: &str) -> Result<Option<ProjectRow>>;

    async fn projects(&self, workspace_id: &str) -> Result<Vec<ProjectRow>>;

    async fn task(&self, workspace_id: &str, task_id: &str) -> Result<Option<TaskRow>>;

    async fn tasks(&self, workspace_id: &str, filter: &TaskFilter) -> Result<Vec<TaskRow>>;

    async fn epic(&self, workspace_id: &str, epic_id: &str) -> Result<Option<EpicRow>>;

    async fn epics(&self, workspace_id: &str, project_id: Option<&str>) -> Result<Vec<EpicRow>>;

    async fn org_positions(&self, workspace_id: &str) -> Result<Vec<OrgPositionRow>>;

    async fn activity(&self, workspace_id: &str, limit: usize) -> Result<Vec<ActivityRow>>;
}
