//! Deterministic text rendering of context objects for embedding.
//!
//! The output is a few `Label: value` lines per kind. It depends only on the
//! object's content (never on its header timestamp), so rebuilding a
//! snapshot of an unchanged entity yields the same text and the same
//! content hash.

use crate::models::{ContextObject, UnifiedAnchor};
use crate::text::{collapse_whitespace, truncate_chars};

/// Maximum characters of free text (page content, descriptions) included.
pub const EXCERPT_CHARS: usize = 500;

struct Lines(Vec<String>);

impl Lines {
    fn new() -> Self {
        Lines(Vec::new())
    }

    fn push(&mut self, label: &str, value: impl AsRef<str>) {
        let value = collapse_whitespace(value.as_ref());
        if !value.is_empty() {
            self.0.push(format!("{}: {}", label, value));
        }
    }

    fn push_opt(&mut self, label: &str, value: Option<&str>) {
        if let Some(v) = value {
            self.push(label, v);
        }
    }

    fn push_snippet(&mut self, label: &str, value: Option<&str>) {
        if let Some(v) = value {
            self.push(label, truncate_chars(&collapse_whitespace(v), EXCERPT_CHARS));
        }
    }

    fn push_list(&mut self, label: &str, values: &[String]) {
        if !values.is_empty() {
            self.push(label, values.join(", "));
        }
    }

    fn finish(self) -> String {
        self.0.join("\n")
    }
}

/// Render `ctx` as embedding input.
pub fn build_embedding_text(ctx: &ContextObject) -> String {
    let mut out = Lines::new();
    out.push("Type", ctx.kind().label());
    render(ctx, &mut out);
    out.finish()
}

fn render(ctx: &ContextObject, out: &mut Lines) {
    match ctx {
        ContextObject::Workspace(w) => {
            out.push("Title", &w.name);
            out.push_snippet("Description", w.description.as_deref());
            let projects: Vec<String> = w.active_projects.iter().map(|p| p.title.clone()).collect();
            out.push_list("Active projects", &projects);
            let pages: Vec<String> = w.recent_pages.iter().map(|p| p.title.clone()).collect();
            out.push_list("Recent pages", &pages);
        }
        ContextObject::Page(p) => {
            out.push("Title", &p.title);
            let trail: Vec<String> = p.breadcrumbs.iter().map(|b| b.title.clone()).collect();
            if !trail.is_empty() {
                out.push("Path", trail.join(" / "));
            }
            out.push_list("Tags", &p.tags);
            out.push_snippet("Content", Some(&p.content));
        }
        ContextObject::Project(p) => {
            out.push("Title", &p.name);
            out.push("Status", p.status.as_str());
            out.push_list("Tags", &p.tags);
            out.push_snippet("Description", p.description.as_deref());
            let epics: Vec<String> = p.epics.iter().map(|e| e.title.clone()).collect();
            out.push_list("Epics", &epics);
        }
        ContextObject::Task(t) => {
            out.push("Title", &t.title);
            out.push("Status", t.status.as_str());
            out.push("Priority", t.priority.as_str());
            out.push_opt("Assignee", t.assignee_id.as_deref());
            out.push_list("Tags", &t.tags);
            out.push_snippet("Description", t.description.as_deref());
        }
        ContextObject::Epic(e) => {
            out.push("Title", &e.title);
            out.push("Status", e.status.as_str());
            out.push("Progress", format!("{}%", e.progress_percent));
            out.push_snippet("Description", e.description.as_deref());
        }
        ContextObject::Org(o) => {
            let people: Vec<String> = o
                .people
                .iter()
                .map(|p| format!("{} ({})", p.name, p.title))
                .collect();
            out.push_snippet("People", Some(&people.join(", ")));
            let teams: Vec<String> = o.teams.iter().map(|t| t.name.clone()).collect();
            out.push_list("Teams", &teams);
        }
        ContextObject::Activity(a) => {
            let events: Vec<String> = a.events.iter().map(|e| e.summary.clone()).collect();
            out.push_snippet("Events", Some(&events.join("; ")));
        }
        ContextObject::Unified(u) => {
            out.push("Workspace", &u.workspace.name);
            match &u.anchor {
                Some(UnifiedAnchor::Page(p)) => {
                    out.push("Page", &p.title);
                    out.push_snippet("Content", Some(&p.content));
                }
                Some(UnifiedAnchor::Project(p)) => {
                    out.push("Project", &p.name);
                    out.push("Status", p.status.as_str());
                    out.push_snippet("Description", p.description.as_deref());
                }
                Some(UnifiedAnchor::Task { task, project }) => {
                    out.push("Task", &task.title);
                    out.push("Status", task.status.as_str());
                    if let Some(p) = project {
                        out.push("Project", &p.name);
                    }
                    out.push_snippet("Description", task.description.as_deref());
                }
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ContextHeader, EntityRef, PageContext, Priority, TaskContext, TaskStatus,
    };
    use chrono::Utc;

    fn page(content: &str) -> ContextObject {
        ContextObject::Page(PageContext {
            header: ContextHeader::new("pg1", "ws1"),
            title: "Runbook".to_string(),
            content: content.to_string(),
            excerpt: String::new(),
            tags: vec!["ops".to_string(), "oncall".to_string()],
            breadcrumbs: vec![EntityRef::new("root", "Engineering")],
            related_docs: vec![],
            project_id: None,
            owner_id: None,
            is_personal: false,
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn test_deterministic_across_rebuilds() {
        let a = build_embedding_text(&page("Restart the   service\nthen check logs"));
        let b = build_embedding_text(&page("Restart the   service\nthen check logs"));
        assert_eq!(a, b);
        assert!(a.starts_with("Type: Page\nTitle: Runbook"));
        assert!(a.contains("Path: Engineering"));
        assert!(a.contains("Tags: ops, oncall"));
        assert!(a.contains("Content: Restart the service then check logs"));
    }

    #[test]
    fn test_long_content_is_truncated() {
        let text = build_embedding_text(&page(&"x".repeat(2000)));
        let content_line = text.lines().find(|l| l.starts_with("Content: ")).unwrap();
        assert!(content_line.chars().count() <= "Content: ".len() + EXCERPT_CHARS + 1);
    }

    #[test]
    fn test_task_lines() {
        let task = ContextObject::Task(TaskContext {
            header: ContextHeader::new("t1", "ws1"),
            title: "Fix login".to_string(),
            description: None,
            status: TaskStatus::Blocked,
            priority: Priority::High,
            assignee_id: Some("u7".to_string()),
            project_id: None,
            epic_id: None,
            dependencies: vec![],
            tags: vec![],
            due_date: None,
        });
        let text = build_embedding_text(&task);
        assert_eq!(
            text,
            "Type: Task\nTitle: Fix login\nStatus: blocked\nPriority: high\nAssignee: u7"
        );
    }
}
