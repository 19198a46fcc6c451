//! Typed context snapshots.
//!
//! A [`ContextObject`] is a point-in-time view of one domain entity (or a
//! composition of several, for [`UnifiedContext`]) assembled for assistant
//! consumption. Every variant carries a [`ContextHeader`] whose
//! `workspace_id` is the tenant boundary.
//!
//! Objects serialize as internally tagged JSON (`{"type": "project", ...}`)
//! so that the cached `data` column of a context item deserializes back into
//! the exact same value.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::text::excerpt;

/// Version stamped on every context header. Bump when a variant's field set
/// changes shape.
pub const CONTEXT_SCHEMA_VERSION: u16 = 1;

fn default_schema_version() -> u16 {
    CONTEXT_SCHEMA_VERSION
}

// ═══════════════════════════════════════════════════════════════════════
// Kinds and statuses
// ═══════════════════════════════════════════════════════════════════════

/// Discriminant of a [`ContextObject`]; also the `type` column of a
/// context item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Workspace,
    Page,
    Project,
    Task,
    Epic,
    Org,
    Activity,
    Unified,
}

impl ContextKind {
    pub const ALL: [ContextKind; 8] = [
        ContextKind::Workspace,
        ContextKind::Page,
        ContextKind::Project,
        ContextKind::Task,
        ContextKind::Epic,
        ContextKind::Org,
        ContextKind::Activity,
        ContextKind::Unified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::Workspace => "workspace",
            ContextKind::Page => "page",
            ContextKind::Project => "project",
            ContextKind::Task => "task",
            ContextKind::Epic => "epic",
            ContextKind::Org => "org",
            ContextKind::Activity => "activity",
            ContextKind::Unified => "unified",
        }
    }

    /// Human label used in prompts and embedding text.
    pub fn label(&self) -> &'static str {
        match self {
            ContextKind::Workspace => "Workspace",
            ContextKind::Page => "Page",
            ContextKind::Project => "Project",
            ContextKind::Task => "Task",
            ContextKind::Epic => "Epic",
            ContextKind::Org => "Organization",
            ContextKind::Activity => "Activity",
            ContextKind::Unified => "Unified",
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        ContextKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| anyhow::anyhow!("unknown context type: '{}'", s))
    }
}

/// Lowercase, with spaces and hyphens folded to underscores.
fn normalize_token(s: &str) -> String {
    s.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    Active,
    OnHold,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Archived => "archived",
        }
    }

    /// Active or still being planned; archived and completed projects are not.
    pub fn is_active(&self) -> bool {
        matches!(self, ProjectStatus::Active | ProjectStatus::Planning)
    }
}

impl FromStr for ProjectStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match normalize_token(s).as_str() {
            "planning" | "planned" => ProjectStatus::Planning,
            "active" | "in_progress" => ProjectStatus::Active,
            "on_hold" | "paused" => ProjectStatus::OnHold,
            "completed" | "done" => ProjectStatus::Completed,
            "archived" => ProjectStatus::Archived,
            _ => bail!("unknown project status: '{}'", s),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    InReview,
    Blocked,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::InReview => "in_review",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match normalize_token(s).as_str() {
            "todo" | "to_do" | "backlog" | "open" => TaskStatus::Todo,
            "in_progress" | "doing" => TaskStatus::InProgress,
            "in_review" | "review" => TaskStatus::InReview,
            "blocked" => TaskStatus::Blocked,
            "done" | "completed" | "closed" => TaskStatus::Done,
            "cancelled" | "canceled" => TaskStatus::Cancelled,
            _ => bail!("unknown task status: '{}'", s),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match normalize_token(s).as_str() {
            "low" => Priority::Low,
            "medium" | "normal" => Priority::Medium,
            "high" => Priority::High,
            "urgent" | "critical" => Priority::Urgent,
            _ => bail!("unknown priority: '{}'", s),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Shared building blocks
// ═══════════════════════════════════════════════════════════════════════

/// Fields every context variant carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextHeader {
    /// Id of the underlying entity (page id, project id, ...). For
    /// workspace-level snapshots this is the workspace id.
    pub id: String,
    pub workspace_id: String,
    /// When the snapshot was built.
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
}

impl ContextHeader {
    pub fn new(id: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            timestamp: Utc::now(),
            schema_version: CONTEXT_SCHEMA_VERSION,
        }
    }
}

/// A lightweight pointer to another entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCounts {
    pub total: u32,
    pub todo: u32,
    pub in_progress: u32,
    pub blocked: u32,
    pub done: u32,
}

impl TaskCounts {
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a TaskStatus>) -> Self {
        let mut counts = TaskCounts::default();
        for status in statuses {
            counts.total += 1;
            match status {
                TaskStatus::Todo => counts.todo += 1,
                TaskStatus::InProgress | TaskStatus::InReview => counts.in_progress += 1,
                TaskStatus::Blocked => counts.blocked += 1,
                TaskStatus::Done | TaskStatus::Cancelled => counts.done += 1,
            }
        }
        counts
    }

    /// Share of completed tasks, rounded down, in `0..=100`.
    pub fn progress_percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.done as u64 * 100) / self.total as u64) as u8
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Variants
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceStats {
    pub page_count: u32,
    pub project_count: u32,
    pub active_project_count: u32,
    pub task_count: u32,
    pub open_task_count: u32,
    pub member_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceContext {
    #[serde(flatten)]
    pub header: ContextHeader,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub stats: WorkspaceStats,
    #[serde(default)]
    pub recent_pages: Vec<EntityRef>,
    /// Only projects whose status is active; archived ones never appear here.
    #[serde(default)]
    pub active_projects: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedDoc {
    pub id: String,
    pub title: String,
    pub shared_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    #[serde(flatten)]
    pub header: ContextHeader,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Root first, immediate parent last.
    #[serde(default)]
    pub breadcrumbs: Vec<EntityRef>,
    #[serde(default)]
    pub related_docs: Vec<RelatedDoc>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub is_personal: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    #[serde(flatten)]
    pub header: ContextHeader,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub task_counts: TaskCounts,
    #[serde(default)]
    pub epics: Vec<EntityRef>,
    #[serde(default)]
    pub open_tasks: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskContext {
    #[serde(flatten)]
    pub header: ContextHeader,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub epic_id: Option<String>,
    /// Tasks this one depends on.
    #[serde(default)]
    pub dependencies: Vec<EntityRef>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpicContext {
    #[serde(flatten)]
    pub header: ContextHeader,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub project_id: Option<String>,
    pub task_counts: TaskCounts,
    pub progress_percent: u8,
    #[serde(default)]
    pub tasks: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgPerson {
    pub user_id: String,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub manager_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub id: String,
    pub name: String,
    pub member_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgContext {
    #[serde(flatten)]
    pub header: ContextHeader,
    #[serde(default)]
    pub people: Vec<OrgPerson>,
    #[serde(default)]
    pub teams: Vec<TeamSummary>,
    #[serde(default)]
    pub focus_role_id: Option<String>,
    #[serde(default)]
    pub focus_team_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub id: String,
    pub actor_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub summary: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityContext {
    #[serde(flatten)]
    pub header: ContextHeader,
    /// Newest first.
    #[serde(default)]
    pub events: Vec<ActivityEvent>,
}

/// The single focused entity of a [`UnifiedContext`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UnifiedAnchor {
    Page(PageContext),
    Project(ProjectContext),
    Task {
        task: TaskContext,
        /// The project the task belongs to, when it has one.
        #[serde(default)]
        project: Option<ProjectContext>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedContext {
    #[serde(flatten)]
    pub header: ContextHeader,
    pub workspace: WorkspaceContext,
    #[serde(default)]
    pub anchor: Option<UnifiedAnchor>,
}

// ═══════════════════════════════════════════════════════════════════════
// ContextObject
// ═══════════════════════════════════════════════════════════════════════

/// Typed snapshot of a domain entity, one variant per [`ContextKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContextObject {
    Workspace(WorkspaceContext),
    Page(PageContext),
    Project(ProjectContext),
    Task(TaskContext),
    Epic(EpicContext),
    Org(OrgContext),
    Activity(ActivityContext),
    Unified(UnifiedContext),
}

impl ContextObject {
    pub fn header(&self) -> &ContextHeader {
        match self {
            ContextObject::Workspace(c) => &c.header,
            ContextObject::Page(c) => &c.header,
            ContextObject::Project(c) => &c.header,
            ContextObject::Task(c) => &c.header,
            ContextObject::Epic(c) => &c.header,
            ContextObject::Org(c) => &c.header,
            ContextObject::Activity(c) => &c.header,
            ContextObject::Unified(c) => &c.header,
        }
    }

    pub fn kind(&self) -> ContextKind {
        match self {
            ContextObject::Workspace(_) => ContextKind::Workspace,
            ContextObject::Page(_) => ContextKind::Page,
            ContextObject::Project(_) => ContextKind::Project,
            ContextObject::Task(_) => ContextKind::Task,
            ContextObject::Epic(_) => ContextKind::Epic,
            ContextObject::Org(_) => ContextKind::Org,
            ContextObject::Activity(_) => ContextKind::Activity,
            ContextObject::Unified(_) => ContextKind::Unified,
        }
    }

    pub fn id(&self) -> &str {
        &self.header().id
    }

    pub fn workspace_id(&self) -> &str {
        &self.header().workspace_id
    }

    /// Display title used for the context item row.
    pub fn title(&self) -> String {
        match self {
            ContextObject::Workspace(c) => c.name.clone(),
            ContextObject::Page(c) => c.title.clone(),
            ContextObject::Project(c) => c.name.clone(),
            ContextObject::Task(c) => c.title.clone(),
            ContextObject::Epic(c) => c.title.clone(),
            ContextObject::Org(_) => "Organization".to_string(),
            ContextObject::Activity(_) => "Recent activity".to_string(),
            ContextObject::Unified(c) => match &c.anchor {
                Some(UnifiedAnchor::Page(p)) => format!("{} / {}", c.workspace.name, p.title),
                Some(UnifiedAnchor::Project(p)) => format!("{} / {}", c.workspace.name, p.name),
                Some(UnifiedAnchor::Task { task, .. }) => {
                    format!("{} / {}", c.workspace.name, task.title)
                }
                None => c.workspace.name.clone(),
            },
        }
    }

    /// Short, deterministic one-line summary.
    pub fn summary(&self) -> String {
        match self {
            ContextObject::Workspace(c) => format!(
                "{} pages, {} projects ({} active), {} open of {} tasks, {} members",
                c.stats.page_count,
                c.stats.project_count,
                c.stats.active_project_count,
                c.stats.open_task_count,
                c.stats.task_count,
                c.stats.member_count
            ),
            ContextObject::Page(c) => excerpt(&c.content, 200),
            ContextObject::Project(c) => format!(
                "{} project, {} tasks ({} in progress, {} blocked, {} done)",
                c.status.as_str(),
                c.task_counts.total,
                c.task_counts.in_progress,
                c.task_counts.blocked,
                c.task_counts.done
            ),
            ContextObject::Task(c) => {
                let mut s = format!("{} · {} priority", c.status.as_str(), c.priority.as_str());
                if let Some(a) = &c.assignee_id {
                    s.push_str(&format!(" · assigned to {}", a));
                }
                if !c.dependencies.is_empty() {
                    s.push_str(&format!(" · {} dependencies", c.dependencies.len()));
                }
                s
            }
            ContextObject::Epic(c) => format!(
                "{} epic, {}% complete ({} of {} tasks done)",
                c.status.as_str(),
                c.progress_percent,
                c.task_counts.done,
                c.task_counts.total
            ),
            ContextObject::Org(c) => {
                format!("{} people across {} teams", c.people.len(), c.teams.len())
            }
            ContextObject::Activity(c) => match c.events.first() {
                Some(latest) => format!(
                    "{} recent events; latest: {}",
                    c.events.len(),
                    excerpt(&latest.summary, 120)
                ),
                None => "no recent activity".to_string(),
            },
            ContextObject::Unified(c) => {
                let anchor = match &c.anchor {
                    Some(UnifiedAnchor::Page(p)) => format!("page '{}'", p.title),
                    Some(UnifiedAnchor::Project(p)) => format!("project '{}'", p.name),
                    Some(UnifiedAnchor::Task { task, project }) => match project {
                        Some(p) => format!("task '{}' in project '{}'", task.title, p.name),
                        None => format!("task '{}'", task.title),
                    },
                    None => "no anchor".to_string(),
                };
                format!("workspace '{}' focused on {}", c.workspace.name, anchor)
            }
        }
    }

    /// True when this object, and every object nested inside it, belongs to
    /// `workspace_id`.
    pub fn is_scoped_to(&self, workspace_id: &str) -> bool {
        if workspace_id.is_empty() || self.workspace_id() != workspace_id {
            return false;
        }
        match self {
            ContextObject::Unified(u) => {
                if u.workspace.header.workspace_id != workspace_id {
                    return false;
                }
                match &u.anchor {
                    None => true,
                    Some(UnifiedAnchor::Page(p)) => p.header.workspace_id == workspace_id,
                    Some(UnifiedAnchor::Project(p)) => p.header.workspace_id == workspace_id,
                    Some(UnifiedAnchor::Task { task, project }) => {
                        task.header.workspace_id == workspace_id
                            && project
                                .as_ref()
                                .map_or(true, |p| p.header.workspace_id == workspace_id)
                    }
                }
            }
            _ => true,
        }
    }
}

impl From<WorkspaceContext> for ContextObject {
    fn from(c: WorkspaceContext) -> Self {
        ContextObject::Workspace(c)
    }
}

impl From<PageContext> for ContextObject {
    fn from(c: PageContext) -> Self {
        ContextObject::Page(c)
    }
}

impl From<ProjectContext> for ContextObject {
    fn from(c: ProjectContext) -> Self {
        ContextObject::Project(c)
    }
}

impl From<TaskContext> for ContextObject {
    fn from(c: TaskContext) -> Self {
        ContextObject::Task(c)
    }
}

impl From<EpicContext> for ContextObject {
    fn from(c: EpicContext) -> Self {
        ContextObject::Epic(c)
    }
}

impl From<OrgContext> for ContextObject {
    fn from(c: OrgContext) -> Self {
        ContextObject::Org(c)
    }
}

impl From<ActivityContext> for ContextObject {
    fn from(c: ActivityContext) -> Self {
        ContextObject::Activity(c)
    }
}

impl From<UnifiedContext> for ContextObject {
    fn from(c: UnifiedContext) -> Self {
        ContextObject::Unified(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(ws: &str) -> ProjectContext {
        ProjectContext {
            header: ContextHeader::new("p1", ws),
            name: "Apollo".to_string(),
            description: Some("Launch".to_string()),
            status: ProjectStatus::Active,
            tags: vec!["launch".to_string()],
            owner_id: Some("u1".to_string()),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 1),
            task_counts: TaskCounts::tally(&[TaskStatus::Todo, TaskStatus::Done]),
            epics: vec![EntityRef::new("e1", "Phase 1")],
            open_tasks: vec![],
        }
    }

    #[test]
    fn test_json_roundtrip_is_lossless() {
        let obj = ContextObject::Project(project("ws1"));
        let json = serde_json::to_value(&obj).unwrap();
        assert_eq!(json["type"], "project");
        assert_eq!(json["workspaceId"], "ws1");
        let back: ContextObject = serde_json::from_value(json).unwrap();
        assert_eq!(back, obj);
    }

    #[test]
    fn test_unified_scope_checks_nested_objects() {
        let ws = WorkspaceContext {
            header: ContextHeader::new("ws1", "ws1"),
            name: "Acme".to_string(),
            description: None,
            stats: WorkspaceStats::default(),
            recent_pages: vec![],
            active_projects: vec![],
        };
        let mut unified = UnifiedContext {
            header: ContextHeader::new("ws1", "ws1"),
            workspace: ws,
            anchor: Some(UnifiedAnchor::Project(project("ws1"))),
        };
        assert!(ContextObject::Unified(unified.clone()).is_scoped_to("ws1"));

        unified.anchor = Some(UnifiedAnchor::Project(project("ws2")));
        assert!(!ContextObject::Unified(unified).is_scoped_to("ws1"));
    }

    #[test]
    fn test_status_parsing_is_lenient_about_format() {
        assert_eq!("In Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("on-hold".parse::<ProjectStatus>().unwrap(), ProjectStatus::OnHold);
        assert!("sideways".parse::<TaskStatus>().is_err());
        assert!(Priority::Urgent > Priority::Low);
    }

    #[test]
    fn test_task_counts_progress() {
        let counts = TaskCounts::tally(&[
            TaskStatus::Done,
            TaskStatus::Done,
            TaskStatus::Blocked,
            TaskStatus::InReview,
        ]);
        assert_eq!(counts.total, 4);
        assert_eq!(counts.in_progress, 1);
        assert_eq!(counts.progress_percent(), 50);
        assert_eq!(TaskCounts::default().progress_percent(), 0);
    }
}
