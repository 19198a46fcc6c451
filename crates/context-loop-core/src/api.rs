//! Request and response types of the assistant loop.
//!
//! These are the wire shapes accepted by `POST /v1/loop` and produced by the
//! orchestrator. Field names are camelCase on the wire.

use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::ContextKind;

/// Which surface of the product the question was asked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    Spaces,
    Org,
    Dashboard,
}

impl LoopMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::Spaces => "spaces",
            LoopMode::Org => "org",
            LoopMode::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoopMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spaces" => Ok(LoopMode::Spaces),
            "org" => Ok(LoopMode::Org),
            "dashboard" => Ok(LoopMode::Dashboard),
            other => anyhow::bail!("unknown mode: '{}'. Use spaces, org, or dashboard.", other),
        }
    }
}

/// Entity ids that focus context loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchors {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
}

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Anchors {
    pub fn project(&self) -> Option<&str> {
        present(&self.project_id)
    }

    pub fn page(&self) -> Option<&str> {
        present(&self.page_id)
    }

    pub fn task(&self) -> Option<&str> {
        present(&self.task_id)
    }

    pub fn role(&self) -> Option<&str> {
        present(&self.role_id)
    }

    pub fn team(&self) -> Option<&str> {
        present(&self.team_id)
    }

    /// A project, page, or task anchor is present. Role and team anchors
    /// only refine org context and do not count.
    pub fn has_entity_anchor(&self) -> bool {
        self.project().is_some() || self.page().is_some() || self.task().is_some()
    }
}

/// An inbound assistant query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopRequest {
    pub workspace_id: String,
    pub user_id: String,
    pub mode: LoopMode,
    pub query: String,
    #[serde(default)]
    pub anchors: Anchors,
    #[serde(default)]
    pub use_semantic_search: bool,
    #[serde(default)]
    pub max_context_items: Option<usize>,
    #[serde(default)]
    pub action_flag: bool,
    #[serde(default)]
    pub action_channel: Option<String>,
}

impl LoopRequest {
    pub fn new(
        workspace_id: impl Into<String>,
        user_id: impl Into<String>,
        mode: LoopMode,
        query: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            user_id: user_id.into(),
            mode,
            query: query.into(),
            anchors: Anchors::default(),
            use_semantic_search: false,
            max_context_items: None,
            action_flag: false,
            action_channel: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRef {
    pub kind: ContextKind,
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticHitSummary {
    pub item_id: String,
    pub context_id: String,
    pub kind: ContextKind,
    pub title: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceCounts {
    pub projects: usize,
    pub tasks: usize,
    pub epics: usize,
    pub documents: usize,
    pub people: usize,
}

/// What context actually went into the prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    #[serde(default)]
    pub primary: Option<ContextRef>,
    #[serde(default)]
    pub supporting: Vec<ContextRef>,
    pub sources_used: Vec<String>,
    pub sources_failed: Vec<String>,
    pub semantic_hits: Vec<SemanticHitSummary>,
    pub slices: SliceCounts,
}

/// Outcome of one executed action (embedded command or short-circuit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub verb: String,
    #[serde(default)]
    pub channel: Option<String>,
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub model: String,
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
    pub retrieved_count: usize,
    pub declared_mode: LoopMode,
    pub short_circuited: bool,
    pub actions_executed: Vec<ActionOutcome>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopResponse {
    /// The effective mode after anchor resolution.
    pub mode: LoopMode,
    pub workspace_id: String,
    pub user_id: String,
    pub query: String,
    pub context: ContextSummary,
    /// Markdown.
    pub answer: String,
    pub suggestions: Vec<String>,
    pub metadata: ResponseMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_minimal_json() {
        let req: LoopRequest = serde_json::from_str(
            r#"{"workspaceId":"ws1","userId":"u1","mode":"dashboard","query":"hi"}"#,
        )
        .unwrap();
        assert_eq!(req.mode, LoopMode::Dashboard);
        assert!(!req.use_semantic_search);
        assert!(req.max_context_items.is_none());
        assert!(!req.anchors.has_entity_anchor());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let res: Result<LoopRequest, _> = serde_json::from_str(
            r#"{"workspaceId":"ws1","userId":"u1","mode":"galaxy","query":"hi"}"#,
        );
        assert!(res.is_err());
        assert!("galaxy".parse::<LoopMode>().is_err());
        assert_eq!("Org".parse::<LoopMode>().unwrap(), LoopMode::Org);
    }

    #[test]
    fn test_blank_anchor_is_ignored() {
        let anchors = Anchors {
            project_id: Some("  ".to_string()),
            role_id: Some("r1".to_string()),
            ..Default::default()
        };
        assert!(!anchors.has_entity_anchor());
        assert_eq!(anchors.role(), Some("r1"));
    }
}
