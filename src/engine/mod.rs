//! Context engine.
//!
//! Builds typed [`ContextObject`] snapshots from the [`DomainSource`], one
//! builder per kind, and caches each result in the [`ContextStore`].
//!
//! # Tenant scoping
//!
//! Every domain query carries the request's `workspace_id`. Rows that come
//! back with a different workspace are dropped and logged, and a finished
//! object is checked with [`ContextObject::is_scoped_to`] before it leaves
//! the engine.
//!
//! # Caching
//!
//! Writes to the store are cache-aside and best-effort: a failed `save` is
//! logged and the freshly built object is still returned.

mod slices;

pub use slices::{ProjectSlice, SLICE_LIMIT};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Result};

use context_loop_core::api::Anchors;
use context_loop_core::domain::{
    DomainSource, PageFilter, PageRow, ProjectRow, Scoped, TaskFilter,
};
use context_loop_core::models::{
    ActivityContext, ActivityEvent, ContextHeader, ContextObject, EntityRef, EpicContext,
    OrgContext, OrgPerson, PageContext, ProjectContext, RelatedDoc, TaskContext, TaskCounts,
    TeamSummary, UnifiedAnchor, UnifiedContext, WorkspaceContext, WorkspaceStats,
};
use context_loop_core::store::ContextStore;
use context_loop_core::text::excerpt;

use crate::config::RetrievalConfig;

/// How far up the page tree breadcrumbs are followed.
pub const MAX_BREADCRUMB_DEPTH: usize = 10;

const PAGE_EXCERPT_CHARS: usize = 500;

pub struct ContextEngine {
    domain: Arc<dyn DomainSource>,
    store: Arc<dyn ContextStore>,
    retrieval: RetrievalConfig,
}

/// Keep `row` only if it belongs to `workspace_id`.
fn own<T: Scoped>(row: Option<T>, workspace_id: &str, entity: &str) -> Option<T> {
    match row {
        Some(r) if r.workspace_id() == workspace_id => Some(r),
        Some(r) => {
            tracing::error!(
                workspace_id,
                foreign_workspace = r.workspace_id(),
                entity,
                "domain source returned a row from another workspace; discarded"
            );
            None
        }
        None => None,
    }
}

fn retain_own<T: Scoped>(rows: Vec<T>, workspace_id: &str, entity: &str) -> Vec<T> {
    let before = rows.len();
    let kept: Vec<T> = rows
        .into_iter()
        .filter(|r| r.workspace_id() == workspace_id)
        .collect();
    if kept.len() != before {
        tracing::error!(
            workspace_id,
            entity,
            discarded = before - kept.len(),
            "domain source returned rows from another workspace; discarded"
        );
    }
    kept
}

fn project_ref(p: &ProjectRow) -> EntityRef {
    EntityRef::new(&p.id, &p.name).with_status(p.status.as_str())
}

fn lowercase_tags(tags: &[String]) -> HashSet<String> {
    tags.iter().map(|t| t.trim().to_lowercase()).collect()
}

/// Pages sharing at least one tag with `page`, most shared first, then most
/// recently updated. `candidates` must already be newest first.
fn related_by_tags(page: &PageRow, candidates: &[PageRow], limit: usize) -> Vec<RelatedDoc> {
    let own_tags = lowercase_tags(&page.tags);
    if own_tags.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<RelatedDoc> = candidates
        .iter()
        .filter(|c| c.id != page.id)
        .filter_map(|c| {
            let mut shared: Vec<String> = c
                .tags
                .iter()
                .filter(|t| own_tags.contains(&t.trim().to_lowercase()))
                .cloned()
                .collect();
            if shared.is_empty() {
                return None;
            }
            shared.sort();
            shared.dedup();
            Some(RelatedDoc {
                id: c.id.clone(),
                title: c.title.clone(),
                shared_tags: shared,
            })
        })
        .collect();

    // Stable sort keeps recency order among equal overlaps.
    scored.sort_by(|a, b| b.shared_tags.len().cmp(&a.shared_tags.len()));
    scored.truncate(limit);
    scored
}

impl ContextEngine {
    pub fn new(
        domain: Arc<dyn DomainSource>,
        store: Arc<dyn ContextStore>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            domain,
            store,
            retrieval,
        }
    }

    /// Check scoping, then cache. Returns the object unchanged.
    async fn finish<T>(&self, workspace_id: &str, ctx: T) -> Result<T>
    where
        T: Clone + Into<ContextObject>,
    {
        let obj: ContextObject = ctx.clone().into();
        if !obj.is_scoped_to(workspace_id) {
            tracing::error!(
                workspace_id,
                kind = %obj.kind(),
                context_id = obj.id(),
                "built context crosses workspace boundary"
            );
            bail!("context {} {} is not scoped to the request workspace", obj.kind(), obj.id());
        }

        if let Err(e) = self.store.save(&obj).await {
            tracing::warn!(
                workspace_id,
                kind = %obj.kind(),
                context_id = obj.id(),
                error = %e,
                "failed to cache context"
            );
        }
        Ok(ctx)
    }

    pub async fn workspace_context(&self, workspace_id: &str) -> Result<Option<WorkspaceContext>> {
        let Some(ws) = own(self.domain.workspace(workspace_id).await?, workspace_id, "workspace")
        else {
            return Ok(None);
        };

        let pages = retain_own(
            self.domain.pages(workspace_id, &PageFilter::default()).await?,
            workspace_id,
            "page",
        );
        let projects = retain_own(self.domain.projects(workspace_id).await?, workspace_id, "project");
        let tasks = retain_own(
            self.domain.tasks(workspace_id, &TaskFilter::default()).await?,
            workspace_id,
            "task",
        );

        let active_projects: Vec<EntityRef> = projects
            .iter()
            .filter(|p| p.status.is_active())
            .map(project_ref)
            .collect();

        let stats = WorkspaceStats {
            page_count: pages.len() as u32,
            project_count: projects.len() as u32,
            active_project_count: active_projects.len() as u32,
            task_count: tasks.len() as u32,
            open_task_count: tasks.iter().filter(|t| !t.status.is_completed()).count() as u32,
            member_count: ws.member_count,
        };

        let ctx = WorkspaceContext {
            header: ContextHeader::new(&ws.id, workspace_id),
            name: ws.name,
            description: ws.description,
            stats,
            recent_pages: pages
                .iter()
                .take(self.retrieval.recent_limit)
                .map(|p| EntityRef::new(&p.id, &p.title))
                .collect(),
            active_projects,
        };
        self.finish(workspace_id, ctx).await.map(Some)
    }

    /// Parent chain of a page, root first. Stops at a missing or foreign
    /// parent, a repeated id, or [`MAX_BREADCRUMB_DEPTH`] levels.
    async fn breadcrumbs(&self, workspace_id: &str, page: &PageRow) -> Result<Vec<EntityRef>> {
        let mut trail = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([page.id.clone()]);
        let mut next = page.parent_id.clone();

        while let Some(parent_id) = next {
            if trail.len() >= MAX_BREADCRUMB_DEPTH {
                break;
            }
            if !seen.insert(parent_id.clone()) {
                tracing::warn!(workspace_id, page_id = %page.id, parent_id = %parent_id, "cycle in page hierarchy");
                break;
            }
            let Some(parent) = own(
                self.domain.page(workspace_id, &parent_id).await?,
                workspace_id,
                "page",
            ) else {
                break;
            };
            trail.push(EntityRef::new(&parent.id, &parent.title));
            next = parent.parent_id;
        }

        trail.reverse();
        Ok(trail)
    }

    pub async fn page_context(&self, workspace_id: &str, page_id: &str) -> Result<Option<PageContext>> {
        let Some(page) = own(self.domain.page(workspace_id, page_id).await?, workspace_id, "page")
        else {
            return Ok(None);
        };

        let breadcrumbs = self.breadcrumbs(workspace_id, &page).await?;
        let related_docs = if page.tags.is_empty() {
            Vec::new()
        } else {
            let candidates = retain_own(
                self.domain.pages(workspace_id, &PageFilter::default()).await?,
                workspace_id,
                "page",
            );
            related_by_tags(&page, &candidates, self.retrieval.related_limit)
        };

        let ctx = PageContext {
            header: ContextHeader::new(&page.id, workspace_id),
            excerpt: excerpt(&page.content, PAGE_EXCERPT_CHARS),
            title: page.title,
            content: page.content,
            tags: page.tags,
            breadcrumbs,
            related_docs,
            project_id: page.project_id,
            owner_id: page.owner_id,
            is_personal: page.is_personal,
            updated_at: page.updated_at,
        };
        self.finish(workspace_id, ctx).await.map(Some)
    }

    pub async fn project_context(
        &self,
        workspace_id: &str,
        project_id: &str,
    ) -> Result<Option<ProjectContext>> {
        let Some(project) = own(
            self.domain.project(workspace_id, project_id).await?,
            workspace_id,
            "project",
        ) else {
            return Ok(None);
        };

        let filter = TaskFilter {
            project_id: Some(project.id.clone()),
            ..Default::default()
        };
        let tasks = retain_own(self.domain.tasks(workspace_id, &filter).await?, workspace_id, "task");
        let epics = retain_own(
            self.domain.epics(workspace_id, Some(&project.id)).await?,
            workspace_id,
            "epic",
        );

        let ctx = ProjectContext {
            header: ContextHeader::new(&project.id, workspace_id),
            name: project.name,
            description: project.description,
            status: project.status,
            tags: project.tags,
            owner_id: project.owner_id,
            due_date: project.due_date,
            task_counts: TaskCounts::tally(tasks.iter().map(|t| &t.status)),
            epics: epics
                .iter()
                .map(|e| EntityRef::new(&e.id, &e.title).with_status(e.status.as_str()))
                .collect(),
            open_tasks: tasks
                .iter()
                .filter(|t| !t.status.is_completed())
                .take(self.retrieval.recent_limit)
                .map(|t| EntityRef::new(&t.id, &t.title).with_status(t.status.as_str()))
                .collect(),
        };
        self.finish(workspace_id, ctx).await.map(Some)
    }

    pub async fn task_context(&self, workspace_id: &str, task_id: &str) -> Result<Option<TaskContext>> {
        let Some(task) = own(self.domain.task(workspace_id, task_id).await?, workspace_id, "task")
        else {
            return Ok(None);
        };

        let mut dependencies = Vec::with_capacity(task.depends_on.len());
        for dep_id in &task.depends_on {
            match own(self.domain.task(workspace_id, dep_id).await?, workspace_id, "task") {
                Some(dep) => dependencies
                    .push(EntityRef::new(&dep.id, &dep.title).with_status(dep.status.as_str())),
                None => tracing::debug!(workspace_id, task_id, dep_id = %dep_id, "dependency not found"),
            }
        }

        let ctx = TaskContext {
            header: ContextHeader::new(&task.id, workspace_id),
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            assignee_id: task.assignee_id,
            project_id: task.project_id,
            epic_id: task.epic_id,
            dependencies,
            tags: task.tags,
            due_date: task.due_date,
        };
        self.finish(workspace_id, ctx).await.map(Some)
    }

    pub async fn epic_context(&self, workspace_id: &str, epic_id: &str) -> Result<Option<EpicContext>> {
        let Some(epic) = own(self.domain.epic(workspace_id, epic_id).await?, workspace_id, "epic")
        else {
            return Ok(None);
        };

        let filter = TaskFilter {
            epic_id: Some(epic.id.clone()),
            ..Default::default()
        };
        let tasks = retain_own(self.domain.tasks(workspace_id, &filter).await?, workspace_id, "task");
        let task_counts = TaskCounts::tally(tasks.iter().map(|t| &t.status));

        let ctx = EpicContext {
            header: ContextHeader::new(&epic.id, workspace_id),
            title: epic.title,
            description: epic.description,
            status: epic.status,
            project_id: epic.project_id,
            progress_percent: task_counts.progress_percent(),
            task_counts,
            tasks: tasks
                .iter()
                .map(|t| EntityRef::new(&t.id, &t.title).with_status(t.status.as_str()))
                .collect(),
        };
        self.finish(workspace_id, ctx).await.map(Some)
    }

    /// People and teams of the workspace. Members of the focused team or
    /// role are listed first.
    pub async fn org_context(
        &self,
        workspace_id: &str,
        focus_role_id: Option<&str>,
        focus_team_id: Option<&str>,
    ) -> Result<OrgContext> {
        let positions = retain_own(
            self.domain.org_positions(workspace_id).await?,
            workspace_id,
            "org position",
        );

        let mut teams: BTreeMap<String, TeamSummary> = BTreeMap::new();
        for p in &positions {
            if let Some(team_id) = &p.team_id {
                teams
                    .entry(team_id.clone())
                    .or_insert_with(|| TeamSummary {
                        id: team_id.clone(),
                        name: p.team_name.clone().unwrap_or_else(|| team_id.clone()),
                        member_count: 0,
                    })
                    .member_count += 1;
            }
        }

        let mut people: Vec<OrgPerson> = positions
            .into_iter()
            .map(|p| OrgPerson {
                user_id: p.user_id,
                name: p.name,
                title: p.title,
                team_id: p.team_id,
                team_name: p.team_name,
                role_id: p.role_id,
                manager_id: p.manager_id,
            })
            .collect();
        let in_focus = |p: &OrgPerson| {
            focus_role_id.is_some_and(|r| p.role_id.as_deref() == Some(r))
                || focus_team_id.is_some_and(|t| p.team_id.as_deref() == Some(t))
        };
        people.sort_by_key(|p| !in_focus(p));

        let ctx = OrgContext {
            header: ContextHeader::new(workspace_id, workspace_id),
            people,
            teams: teams.into_values().collect(),
            focus_role_id: focus_role_id.map(str::to_string),
            focus_team_id: focus_team_id.map(str::to_string),
        };
        self.finish(workspace_id, ctx).await
    }

    pub async fn activity_context(&self, workspace_id: &str) -> Result<ActivityContext> {
        let rows = retain_own(
            self.domain
                .activity(workspace_id, self.retrieval.recent_limit)
                .await?,
            workspace_id,
            "activity",
        );

        let ctx = ActivityContext {
            header: ContextHeader::new(workspace_id, workspace_id),
            events: rows
                .into_iter()
                .map(|r| ActivityEvent {
                    id: r.id,
                    actor_id: r.actor_id,
                    action: r.action,
                    entity_type: r.entity_type,
                    entity_id: r.entity_id,
                    summary: r.summary,
                    occurred_at: r.occurred_at,
                })
                .collect(),
        };
        self.finish(workspace_id, ctx).await
    }

    /// Workspace context plus at most one anchor, chosen page, then
    /// project, then task. A task anchor also carries its project.
    ///
    /// An anchor id that does not resolve in this workspace is ignored.
    pub async fn unified_context(
        &self,
        workspace_id: &str,
        anchors: &Anchors,
    ) -> Result<Option<UnifiedContext>> {
        let Some(workspace) = self.workspace_context(workspace_id).await? else {
            return Ok(None);
        };

        let mut anchor = None;
        if let Some(page_id) = anchors.page() {
            anchor = self
                .page_context(workspace_id, page_id)
                .await?
                .map(UnifiedAnchor::Page);
        }
        if anchor.is_none() {
            if let Some(project_id) = anchors.project() {
                anchor = self
                    .project_context(workspace_id, project_id)
                    .await?
                    .map(UnifiedAnchor::Project);
            }
        }
        if anchor.is_none() {
            if let Some(task_id) = anchors.task() {
                if let Some(task) = self.task_context(workspace_id, task_id).await? {
                    let project = match task.project_id.as_deref() {
                        Some(pid) => self.project_context(workspace_id, pid).await?,
                        None => None,
                    };
                    anchor = Some(UnifiedAnchor::Task { task, project });
                }
            }
        }

        let context_id = match &anchor {
            Some(UnifiedAnchor::Page(p)) => format!("page:{}", p.header.id),
            Some(UnifiedAnchor::Project(p)) => format!("project:{}", p.header.id),
            Some(UnifiedAnchor::Task { task, .. }) => format!("task:{}", task.header.id),
            None => workspace_id.to_string(),
        };

        let ctx = UnifiedContext {
            header: ContextHeader::new(context_id, workspace_id),
            workspace,
            anchor,
        };
        self.finish(workspace_id, ctx).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use context_loop_core::domain::memory::InMemoryDomain;
    use context_loop_core::domain::{OrgPositionRow, TaskRow, WorkspaceRow};
    use context_loop_core::models::{ContextKind, Priority, ProjectStatus, TaskStatus};
    use context_loop_core::store::memory::InMemoryContextStore;

    fn page(id: &str, ws: &str, parent: Option<&str>, tags: &[&str], minutes_ago: i64) -> PageRow {
        PageRow {
            id: id.to_string(),
            workspace_id: ws.to_string(),
            title: format!("Page {}", id),
            content: format!("Body of {}", id),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            parent_id: parent.map(str::to_string),
            project_id: None,
            owner_id: None,
            is_personal: false,
            archived: false,
            created_at: Utc::now() - Duration::days(1),
            updated_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn task(id: &str, project: &str, status: TaskStatus, deps: &[&str]) -> TaskRow {
        TaskRow {
            id: id.to_string(),
            workspace_id: "ws1".to_string(),
            project_id: Some(project.to_string()),
            epic_id: None,
            title: format!("Task {}", id),
            description: None,
            status,
            priority: Priority::Medium,
            assignee_id: None,
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            tags: vec![],
            due_date: None,
            updated_at: Utc::now(),
        }
    }

    fn project(id: &str, status: ProjectStatus) -> ProjectRow {
        ProjectRow {
            id: id.to_string(),
            workspace_id: "ws1".to_string(),
            name: format!("Project {}", id),
            description: None,
            status,
            tags: vec![],
            owner_id: None,
            due_date: None,
            updated_at: Utc::now(),
        }
    }

    fn engine(domain: InMemoryDomain) -> (ContextEngine, Arc<InMemoryContextStore>) {
        let store = Arc::new(InMemoryContextStore::new());
        let engine = ContextEngine::new(Arc::new(domain), store.clone(), RetrievalConfig::default());
        (engine, store)
    }

    #[tokio::test]
    async fn test_breadcrumbs_follow_parents_root_first() {
        let domain = InMemoryDomain::new();
        domain.insert_page(page("root", "ws1", None, &[], 3));
        domain.insert_page(page("mid", "ws1", Some("root"), &[], 2));
        domain.insert_page(page("leaf", "ws1", Some("mid"), &[], 1));
        let (engine, _) = engine(domain);

        let ctx = engine.page_context("ws1", "leaf").await.unwrap().unwrap();
        let ids: Vec<&str> = ctx.breadcrumbs.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "mid"]);
    }

    #[tokio::test]
    async fn test_breadcrumbs_survive_cycles() {
        let domain = InMemoryDomain::new();
        domain.insert_page(page("a", "ws1", Some("b"), &[], 1));
        domain.insert_page(page("b", "ws1", Some("a"), &[], 2));
        let (engine, _) = engine(domain);

        let ctx = engine.page_context("ws1", "a").await.unwrap().unwrap();
        assert_eq!(ctx.breadcrumbs.len(), 1);
        assert_eq!(ctx.breadcrumbs[0].id, "b");
    }

    #[tokio::test]
    async fn test_breadcrumbs_are_capped() {
        let domain = InMemoryDomain::new();
        domain.insert_page(page("p0", "ws1", None, &[], 0));
        for i in 1..=15 {
            let parent = format!("p{}", i - 1);
            domain.insert_page(page(&format!("p{}", i), "ws1", Some(&parent), &[], i));
        }
        let (engine, _) = engine(domain);

        let ctx = engine.page_context("ws1", "p15").await.unwrap().unwrap();
        assert_eq!(ctx.breadcrumbs.len(), MAX_BREADCRUMB_DEPTH);
        assert_eq!(ctx.breadcrumbs.last().unwrap().id, "p14");
    }

    #[tokio::test]
    async fn test_related_docs_by_tag_overlap() {
        let domain = InMemoryDomain::new();
        domain.insert_page(page("me", "ws1", None, &["rust", "db"], 0));
        domain.insert_page(page("both", "ws1", None, &["DB", "rust"], 5));
        domain.insert_page(page("one", "ws1", None, &["rust"], 1));
        domain.insert_page(page("none", "ws1", None, &["ui"], 1));
        domain.insert_page(page("foreign", "ws2", None, &["rust", "db"], 1));
        let (engine, _) = engine(domain);

        let ctx = engine.page_context("ws1", "me").await.unwrap().unwrap();
        let ids: Vec<&str> = ctx.related_docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["both", "one"]);
    }

    #[tokio::test]
    async fn test_other_workspace_entities_are_not_found() {
        let domain = InMemoryDomain::new();
        domain.insert_page(page("p1", "ws2", None, &[], 1));
        let (engine, _) = engine(domain);
        assert!(engine.page_context("ws1", "p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_task_anchor_brings_its_project() {
        let domain = InMemoryDomain::new();
        domain.insert_workspace(WorkspaceRow {
            id: "ws1".to_string(),
            name: "Acme".to_string(),
            description: None,
            member_count: 3,
            created_at: Utc::now(),
        });
        domain.insert_project(project("p1", ProjectStatus::Active));
        domain.insert_task(task("t0", "p1", TaskStatus::Done, &[]));
        domain.insert_task(task("t1", "p1", TaskStatus::Todo, &["t0", "missing"]));
        let (engine, store) = engine(domain);

        let anchors = Anchors {
            task_id: Some("t1".to_string()),
            ..Default::default()
        };
        let ctx = engine.unified_context("ws1", &anchors).await.unwrap().unwrap();
        match ctx.anchor {
            Some(UnifiedAnchor::Task { task, project }) => {
                assert_eq!(task.dependencies.len(), 1);
                let project = project.unwrap();
                assert_eq!(project.header.id, "p1");
                assert_eq!(project.task_counts.total, 2);
                assert_eq!(project.task_counts.done, 1);
            }
            other => panic!("unexpected anchor: {:?}", other),
        }
        assert_eq!(ctx.workspace.stats.open_task_count, 1);

        assert!(store
            .get("task:t1", ContextKind::Unified, "ws1")
            .await
            .unwrap()
            .is_some());
        assert!(store.get("t1", ContextKind::Task, "ws1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_page_anchor_wins_over_project() {
        let domain = InMemoryDomain::new();
        domain.insert_workspace(WorkspaceRow {
            id: "ws1".to_string(),
            name: "Acme".to_string(),
            description: None,
            member_count: 1,
            created_at: Utc::now(),
        });
        domain.insert_page(page("pg", "ws1", None, &[], 1));
        domain.insert_project(project("p1", ProjectStatus::Active));
        let (engine, _) = engine(domain);

        let anchors = Anchors {
            page_id: Some("pg".to_string()),
            project_id: Some("p1".to_string()),
            ..Default::default()
        };
        let ctx = engine.unified_context("ws1", &anchors).await.unwrap().unwrap();
        assert!(matches!(ctx.anchor, Some(UnifiedAnchor::Page(_))));
    }

    #[tokio::test]
    async fn test_workspace_lists_only_active_projects() {
        let domain = InMemoryDomain::new();
        domain.insert_workspace(WorkspaceRow {
            id: "ws1".to_string(),
            name: "Acme".to_string(),
            description: None,
            member_count: 1,
            created_at: Utc::now(),
        });
        domain.insert_project(project("live", ProjectStatus::Active));
        domain.insert_project(project("old", ProjectStatus::Archived));
        let (engine, _) = engine(domain);

        let ctx = engine.workspace_context("ws1").await.unwrap().unwrap();
        assert_eq!(ctx.stats.project_count, 2);
        let ids: Vec<&str> = ctx.active_projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["live"]);
    }

    #[tokio::test]
    async fn test_org_focus_team_first() {
        let domain = InMemoryDomain::new();
        for (uid, name, team) in [("u1", "Ada", "eng"), ("u2", "Bo", "ops"), ("u3", "Cy", "eng")] {
            domain.insert_position(OrgPositionRow {
                id: format!("pos-{}", uid),
                workspace_id: "ws1".to_string(),
                user_id: uid.to_string(),
                name: name.to_string(),
                title: "Engineer".to_string(),
                team_id: Some(team.to_string()),
                team_name: Some(team.to_uppercase()),
                role_id: None,
                manager_id: None,
            });
        }
        let (engine, _) = engine(domain);

        let ctx = engine.org_context("ws1", None, Some("ops")).await.unwrap();
        assert_eq!(ctx.people[0].user_id, "u2");
        assert_eq!(ctx.teams.len(), 2);
        assert_eq!(ctx.teams[0].id, "eng");
        assert_eq!(ctx.teams[0].member_count, 2);
    }
}
