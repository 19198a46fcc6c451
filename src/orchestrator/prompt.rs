//! Prompt assembly.
//!
//! Sections are always emitted in this order, each only when it has
//! content:
//!
//! 1. role
//! 2. messaging capabilities (integration available and the request hints
//!    at an action)
//! 3. primary context
//! 4. semantic search hits
//! 5. structured JSON blocks, one per entity kind
//! 6. the user's question
//! 7. formatting guidance

use std::fmt::Write as _;

use context_loop_core::api::LoopMode;
use context_loop_core::models::{ActivityContext, ContextObject, UnifiedAnchor};
use context_loop_core::structured::StructuredSlices;
use context_loop_core::text::{excerpt, truncate_chars};

use crate::semantic::SemanticHit;

pub const DEFAULT_SYSTEM_PREAMBLE: &str = "You are the workspace assistant of a project and \
knowledge-base product. You answer questions about the user's workspace using only the \
context you are given. You are precise and concise, and you never fabricate projects, \
tasks, documents, people, dates, or statuses.";

pub const SECTION_ROLE: &str = "## Role";
pub const SECTION_CAPABILITIES: &str = "## Messaging actions";
pub const SECTION_PRIMARY: &str = "## Current context";
pub const SECTION_SEMANTIC: &str = "## Related items (semantic search)";
pub const SECTION_STRUCTURED: &str = "## Structured data";
pub const SECTION_QUESTION: &str = "## Question";
pub const SECTION_GUIDANCE: &str = "## Answer format";

const HIT_SUMMARY_CHARS: usize = 300;
const PAGE_BODY_CHARS: usize = 1500;
const ACTIVITY_EVENTS: usize = 10;

const ACTION_HINTS: [&str; 8] = [
    "slack", "channel", "message", "messages", "post", "send", "notify", "dm",
];

/// Everything that goes into one prompt.
pub struct PromptInput<'a> {
    pub mode: LoopMode,
    pub workspace_name: Option<&'a str>,
    pub query: &'a str,
    pub primary: Option<&'a ContextObject>,
    pub activity: Option<&'a ActivityContext>,
    pub semantic_hits: &'a [SemanticHit],
    pub slices: &'a StructuredSlices,
    pub disclose_actions: bool,
}

/// Whether the request hints at a messaging action: an explicit flag or
/// channel, a `#channel` mention, or a messaging keyword.
pub fn has_action_signal(query: &str, action_flag: bool, action_channel: Option<&str>) -> bool {
    if action_flag || action_channel.is_some_and(|c| !c.trim().is_empty()) {
        return true;
    }
    query.split_whitespace().any(|w| {
        if w.starts_with('#') && w.len() > 1 {
            return true;
        }
        let bare: String = w
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        ACTION_HINTS.contains(&bare.as_str())
    })
}

fn mode_focus(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::Spaces => "the page, project, or task the user is looking at",
        LoopMode::Org => "people, teams, and reporting lines",
        LoopMode::Dashboard => "the user's priorities across the workspace",
    }
}

fn render_activity(out: &mut String, activity: &ActivityContext) {
    if activity.events.is_empty() {
        return;
    }
    out.push_str("\n### Recent activity\n");
    for e in activity.events.iter().take(ACTIVITY_EVENTS) {
        let _ = writeln!(
            out,
            "- {} {} {} {}: {}",
            e.occurred_at.format("%Y-%m-%d %H:%M"),
            e.actor_id,
            e.action,
            e.entity_type,
            excerpt(&e.summary, 200)
        );
    }
}

/// Markdown rendering of a context snapshot.
pub fn render_context(obj: &ContextObject) -> String {
    let mut out = String::new();
    match obj {
        ContextObject::Workspace(w) => {
            let _ = writeln!(out, "### Workspace: {}", w.name);
            if let Some(d) = &w.description {
                let _ = writeln!(out, "{}", excerpt(d, 400));
            }
            let _ = writeln!(out, "- Summary: {}", obj.summary());
            if !w.active_projects.is_empty() {
                let names: Vec<&str> = w.active_projects.iter().map(|p| p.title.as_str()).collect();
                let _ = writeln!(out, "- Active projects: {}", names.join(", "));
            }
            if !w.recent_pages.is_empty() {
                let names: Vec<&str> = w.recent_pages.iter().map(|p| p.title.as_str()).collect();
                let _ = writeln!(out, "- Recently updated pages: {}", names.join(", "));
            }
        }
        ContextObject::Page(p) => {
            let _ = writeln!(out, "### Page: {}", p.title);
            if !p.breadcrumbs.is_empty() {
                let trail: Vec<&str> = p.breadcrumbs.iter().map(|b| b.title.as_str()).collect();
                let _ = writeln!(out, "- Location: {}", trail.join(" / "));
            }
            if !p.tags.is_empty() {
                let _ = writeln!(out, "- Tags: {}", p.tags.join(", "));
            }
            let _ = writeln!(out, "- Updated: {}", p.updated_at.format("%Y-%m-%d"));
            if !p.related_docs.is_empty() {
                let titles: Vec<&str> = p.related_docs.iter().map(|d| d.title.as_str()).collect();
                let _ = writeln!(out, "- Related: {}", titles.join(", "));
            }
            let _ = writeln!(out, "\n{}", truncate_chars(p.content.trim(), PAGE_BODY_CHARS));
        }
        ContextObject::Project(p) => {
            let _ = writeln!(out, "### Project: {}", p.name);
            let _ = writeln!(out, "- Status: {}", p.status.as_str());
            if let Some(d) = &p.description {
                let _ = writeln!(out, "- Description: {}", excerpt(d, 400));
            }
            if let Some(due) = p.due_date {
                let _ = writeln!(out, "- Due: {}", due);
            }
            let _ = writeln!(
                out,
                "- Tasks: {} total, {} to do, {} in progress, {} blocked, {} done",
                p.task_counts.total,
                p.task_counts.todo,
                p.task_counts.in_progress,
                p.task_counts.blocked,
                p.task_counts.done
            );
            for e in &p.epics {
                let _ = writeln!(
                    out,
                    "- Epic: {} ({})",
                    e.title,
                    e.status.as_deref().unwrap_or("unknown")
                );
            }
        }
        ContextObject::Task(t) => {
            let _ = writeln!(out, "### Task: {}", t.title);
            let _ = writeln!(
                out,
                "- Status: {} · Priority: {}",
                t.status.as_str(),
                t.priority.as_str()
            );
            if let Some(a) = &t.assignee_id {
                let _ = writeln!(out, "- Assignee: {}", a);
            }
            if let Some(due) = t.due_date {
                let _ = writeln!(out, "- Due: {}", due);
            }
            for d in &t.dependencies {
                let _ = writeln!(
                    out,
                    "- Depends on: {} ({})",
                    d.title,
                    d.status.as_deref().unwrap_or("unknown")
                );
            }
            if let Some(d) = &t.description {
                let _ = writeln!(out, "\n{}", excerpt(d, 800));
            }
        }
        ContextObject::Epic(e) => {
            let _ = writeln!(out, "### Epic: {}", e.title);
            let _ = writeln!(out, "- {}", obj.summary());
        }
        ContextObject::Org(o) => {
            let _ = writeln!(out, "### Organization");
            let _ = writeln!(out, "- {}", obj.summary());
            for team in &o.teams {
                let _ = writeln!(out, "- Team {}: {} members", team.name, team.member_count);
            }
        }
        ContextObject::Activity(a) => render_activity(&mut out, a),
        ContextObject::Unified(u) => {
            out.push_str(&render_context(&ContextObject::Workspace(u.workspace.clone())));
            match &u.anchor {
                Some(UnifiedAnchor::Page(p)) => {
                    out.push('\n');
                    out.push_str(&render_context(&ContextObject::Page(p.clone())));
                }
                Some(UnifiedAnchor::Project(p)) => {
                    out.push('\n');
                    out.push_str(&render_context(&ContextObject::Project(p.clone())));
                }
                Some(UnifiedAnchor::Task { task, project }) => {
                    out.push('\n');
                    out.push_str(&render_context(&ContextObject::Task(task.clone())));
                    if let Some(p) = project {
                        out.push('\n');
                        out.push_str(&render_context(&ContextObject::Project(p.clone())));
                    }
                }
                None => {}
            }
        }
    }
    out
}

fn capability_section() -> String {
    format!(
        "{}\n\
         A messaging integration is connected. When, and only when, the user explicitly asks \
         you to send or read channel messages, include one command per action on its own:\n\
         - `[SEND:channel=#channel-name:text=message to post]`\n\
         - `[READ:channel=#channel-name:limit=20]`\n\
         The commands are executed after you answer and replaced with their result. Do not \
         claim an action already happened.\n",
        SECTION_CAPABILITIES
    )
}

pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", SECTION_ROLE);
    let _ = writeln!(
        out,
        "You are answering from the {} view{}. Focus on {}.",
        input.mode.as_str(),
        input
            .workspace_name
            .map(|n| format!(" of the \"{}\" workspace", n))
            .unwrap_or_default(),
        mode_focus(input.mode)
    );

    if input.disclose_actions {
        out.push('\n');
        out.push_str(&capability_section());
    }

    if input.primary.is_some() || input.activity.is_some_and(|a| !a.events.is_empty()) {
        let _ = writeln!(out, "\n{}", SECTION_PRIMARY);
        if let Some(primary) = input.primary {
            out.push_str(&render_context(primary));
        }
        if let Some(activity) = input.activity {
            render_activity(&mut out, activity);
        }
    }

    if !input.semantic_hits.is_empty() {
        let _ = writeln!(out, "\n{}", SECTION_SEMANTIC);
        for hit in input.semantic_hits {
            let _ = writeln!(
                out,
                "- [{}] {} (relevance {:.2}): {}",
                hit.kind.label(),
                hit.title,
                hit.score,
                excerpt(&hit.summary, HIT_SUMMARY_CHARS)
            );
        }
    }

    let sections = input.slices.sections();
    if !sections.is_empty() {
        let _ = writeln!(out, "\n{}", SECTION_STRUCTURED);
        out.push_str(
            "Use the records below as the source of truth for the workspace. If the user asks \
             about something that is not listed, say explicitly that it is not in the data. \
             Never invent records, ids, statuses, or dates.\n",
        );
        for (label, items) in sections {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            let _ = writeln!(out, "\n### {}\n```json\n{}\n```", label, json);
        }
    }

    let _ = writeln!(out, "\n{}\n{}", SECTION_QUESTION, input.query.trim());

    let _ = writeln!(out, "\n{}", SECTION_GUIDANCE);
    out.push_str(
        "Answer in Markdown. Lead with the direct answer, then supporting detail as short \
         bullet points. Refer to items by their titles, not their ids.\n",
    );

    out
}
