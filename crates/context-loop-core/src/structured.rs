//! Flattened entity records for prompt embedding.
//!
//! [`ContextObject`](crate::models::ContextObject) is the richly typed view
//! used inside the service. The language model instead receives
//! [`StructuredContext`] records: one flat shape for every kind, serialized
//! as JSON blocks in the prompt.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::SliceCounts;
use crate::domain::{EpicRow, OrgPositionRow, PageRow, ProjectRow, TaskRow};
use crate::text::excerpt;

const SUMMARY_CHARS: usize = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuredKind {
    Project,
    Task,
    Epic,
    Document,
    Person,
}

/// A typed edge to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    /// `project`, `epic`, `dependsOn`, `parent`, `team`, `manager`, `owner`,
    /// or `assignee`.
    pub rel: String,
    pub target_id: String,
}

impl Relation {
    fn new(rel: &str, target_id: &str) -> Self {
        Self {
            rel: rel.to_string(),
            target_id: target_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredContext {
    pub kind: StructuredKind,
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
    /// Extra scalar attributes (priority, due date, ...). Ordered for
    /// stable prompts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl StructuredContext {
    fn new(kind: StructuredKind, id: &str, title: &str) -> Self {
        Self {
            kind,
            id: id.to_string(),
            title: title.to_string(),
            summary: String::new(),
            status: None,
            tags: Vec::new(),
            relations: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    fn relate(&mut self, rel: &str, target: Option<&str>) {
        if let Some(t) = target {
            self.relations.push(Relation::new(rel, t));
        }
    }

    fn meta(&mut self, key: &str, value: Option<String>) {
        if let Some(v) = value {
            self.metadata.insert(key.to_string(), v);
        }
    }
}

impl From<&ProjectRow> for StructuredContext {
    fn from(row: &ProjectRow) -> Self {
        let mut s = StructuredContext::new(StructuredKind::Project, &row.id, &row.name);
        s.summary = row
            .description
            .as_deref()
            .map(|d| excerpt(d, SUMMARY_CHARS))
            .unwrap_or_default();
        s.status = Some(row.status.as_str().to_string());
        s.tags = row.tags.clone();
        s.relate("owner", row.owner_id.as_deref());
        s.meta("dueDate", row.due_date.map(|d| d.to_string()));
        s
    }
}

impl From<&TaskRow> for StructuredContext {
    fn from(row: &TaskRow) -> Self {
        let mut s = StructuredContext::new(StructuredKind::Task, &row.id, &row.title);
        s.summary = row
            .description
            .as_deref()
            .map(|d| excerpt(d, SUMMARY_CHARS))
            .unwrap_or_default();
        s.status = Some(row.status.as_str().to_string());
        s.tags = row.tags.clone();
        s.relate("project", row.project_id.as_deref());
        s.relate("epic", row.epic_id.as_deref());
        s.relate("assignee", row.assignee_id.as_deref());
        for dep in &row.depends_on {
            s.relate("dependsOn", Some(dep));
        }
        s.meta("priority", Some(row.priority.as_str().to_string()));
        s.meta("dueDate", row.due_date.map(|d| d.to_string()));
        s
    }
}

impl From<&EpicRow> for StructuredContext {
    fn from(row: &EpicRow) -> Self {
        let mut s = StructuredContext::new(StructuredKind::Epic, &row.id, &row.title);
        s.summary = row
            .description
            .as_deref()
            .map(|d| excerpt(d, SUMMARY_CHARS))
            .unwrap_or_default();
        s.status = Some(row.status.as_str().to_string());
        s.relate("project", row.project_id.as_deref());
        s
    }
}

impl From<&PageRow> for StructuredContext {
    fn from(row: &PageRow) -> Self {
        let mut s = StructuredContext::new(StructuredKind::Document, &row.id, &row.title);
        s.summary = excerpt(&row.content, SUMMARY_CHARS);
        s.tags = row.tags.clone();
        s.relate("parent", row.parent_id.as_deref());
        s.relate("project", row.project_id.as_deref());
        s.relate("owner", row.owner_id.as_deref());
        if row.is_personal {
            s.meta("personal", Some("true".to_string()));
        }
        s.meta("updatedAt", Some(row.updated_at.format("%Y-%m-%d").to_string()));
        s
    }
}

impl From<&OrgPositionRow> for StructuredContext {
    fn from(row: &OrgPositionRow) -> Self {
        let mut s = StructuredContext::new(StructuredKind::Person, &row.user_id, &row.name);
        s.summary = row.title.clone();
        s.relate("team", row.team_id.as_deref());
        s.relate("manager", row.manager_id.as_deref());
        s.meta("team", row.team_name.clone());
        s.meta("role", row.role_id.clone());
        s
    }
}

/// The structured records attached to one prompt, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredSlices {
    pub projects: Vec<StructuredContext>,
    pub tasks: Vec<StructuredContext>,
    pub epics: Vec<StructuredContext>,
    pub documents: Vec<StructuredContext>,
    pub people: Vec<StructuredContext>,
}

impl StructuredSlices {
    pub fn counts(&self) -> SliceCounts {
        SliceCounts {
            projects: self.projects.len(),
            tasks: self.tasks.len(),
            epics: self.epics.len(),
            documents: self.documents.len(),
            people: self.people.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
            && self.tasks.is_empty()
            && self.epics.is_empty()
            && self.documents.is_empty()
            && self.people.is_empty()
    }

    /// Non-empty groups in prompt order, with their section labels.
    pub fn sections(&self) -> Vec<(&'static str, &[StructuredContext])> {
        [
            ("Projects", self.projects.as_slice()),
            ("Epics", self.epics.as_slice()),
            ("Tasks", self.tasks.as_slice()),
            ("Documents", self.documents.as_slice()),
            ("People", self.people.as_slice()),
        ]
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TaskStatus};
    use chrono::Utc;

    fn task() -> TaskRow {
        TaskRow {
            id: "t1".to_string(),
            workspace_id: "ws1".to_string(),
            project_id: Some("p1".to_string()),
            epic_id: None,
            title: "Write migration".to_string(),
            description: Some("Add   the\nindex".to_string()),
            status: TaskStatus::InProgress,
            priority: Priority::High,
            assignee_id: Some("u1".to_string()),
            depends_on: vec!["t0".to_string()],
            tags: vec!["db".to_string()],
            due_date: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_task_flattening() {
        let s = StructuredContext::from(&task());
        assert_eq!(s.kind, StructuredKind::Task);
        assert_eq!(s.summary, "Add the index");
        assert_eq!(s.status.as_deref(), Some("in_progress"));
        let rels: Vec<(&str, &str)> = s
            .relations
            .iter()
            .map(|r| (r.rel.as_str(), r.target_id.as_str()))
            .collect();
        assert_eq!(
            rels,
            vec![("project", "p1"), ("assignee", "u1"), ("dependsOn", "t0")]
        );
        assert_eq!(s.metadata.get("priority").map(String::as_str), Some("high"));
        assert!(!s.metadata.contains_key("dueDate"));
    }

    #[test]
    fn test_empty_fields_are_omitted_from_json() {
        let row = EpicRow {
            id: "e1".to_string(),
            workspace_id: "ws1".to_string(),
            project_id: None,
            title: "Phase 1".to_string(),
            description: None,
            status: TaskStatus::Todo,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(StructuredContext::from(&row)).unwrap();
        assert_eq!(json["kind"], "epic");
        assert!(json.get("summary").is_none());
        assert!(json.get("relations").is_none());
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn test_sections_skip_empty_groups() {
        let slices = StructuredSlices {
            tasks: vec![StructuredContext::from(&task())],
            ..Default::default()
        };
        let labels: Vec<&str> = slices.sections().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["Tasks"]);
        assert_eq!(slices.counts().tasks, 1);
        assert!(!slices.is_empty());
    }
}
