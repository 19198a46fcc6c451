//! Request orchestration.
//!
//! [`Orchestrator::handle`] runs one assistant query end to end:
//!
//! 1. validate the request;
//! 2. resolve the effective mode (an entity anchor forces `spaces`);
//! 3. execute a direct action request without retrieval, if the query is one;
//! 4. assemble context from concurrent, individually time-boxed sources;
//! 5. build the prompt and call the language model once;
//! 6. execute the action commands in the answer, in order;
//! 7. assemble the response.
//!
//! A failing context source is skipped and reported in
//! `context.sourcesFailed`. A failing command becomes an inline note. Only
//! validation and language-model errors fail the request.

pub mod commands;
pub mod prompt;
pub mod suggestions;

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use context_loop_core::api::{
    ContextRef, ContextSummary, LoopMode, LoopRequest, LoopResponse, ResponseMetadata,
    SemanticHitSummary,
};
use context_loop_core::intent::detect_action_intent;
use context_loop_core::models::{ActivityContext, ContextKind, ContextObject, UnifiedAnchor};
use context_loop_core::structured::StructuredSlices;

use crate::actions::ActionAdapter;
use crate::config::Config;
use crate::engine::{ContextEngine, ProjectSlice};
use crate::error::{LoopError, LoopResult};
use crate::llm::{truncate_for_log, CompletionRequest, LlmClient};
use crate::semantic::{SemanticHit, SemanticIndex};

use commands::{CommandExecutor, SummarySettings};
use prompt::{build_prompt, has_action_signal, PromptInput, DEFAULT_SYSTEM_PREAMBLE};
use suggestions::suggestions;

/// Reported as `metadata.model` when no language model was called.
pub const NO_MODEL: &str = "none";

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub source_timeout: Duration,
    pub system_preamble: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub summary_max_tokens: u32,
    pub default_context_items: usize,
    pub max_context_items: usize,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_timeout: Duration::from_millis(config.orchestrator.source_timeout_ms),
            system_preamble: config
                .orchestrator
                .system_preamble
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PREAMBLE.to_string()),
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            summary_max_tokens: config.llm.summary_max_tokens,
            default_context_items: config.retrieval.default_context_items,
            max_context_items: config.retrieval.max_context_items,
        }
    }
}

/// An entity anchor (project, page or task) always means `spaces`.
pub fn resolve_mode(req: &LoopRequest) -> LoopMode {
    if req.anchors.has_entity_anchor() {
        LoopMode::Spaces
    } else {
        req.mode
    }
}

enum Fetch<T> {
    Skipped,
    Done(T),
    Failed,
}

/// Run one context source under its own deadline. Errors and timeouts are
/// logged and reported as [`Fetch::Failed`].
async fn guarded<T, E, F>(source: &'static str, workspace_id: &str, deadline: Duration, fut: F) -> Fetch<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => {
            tracing::debug!(
                workspace_id,
                source,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "context source loaded"
            );
            Fetch::Done(value)
        }
        Ok(Err(e)) => {
            tracing::warn!(workspace_id, source, error = %e, "context source failed; skipping");
            Fetch::Failed
        }
        Err(_) => {
            tracing::warn!(
                workspace_id,
                source,
                timeout_ms = deadline.as_millis() as u64,
                "context source timed out; skipping"
            );
            Fetch::Failed
        }
    }
}

#[derive(Default)]
struct SourceLedger {
    used: Vec<String>,
    failed: Vec<String>,
}

impl SourceLedger {
    fn take<T>(&mut self, source: &str, fetch: Fetch<T>) -> Option<T> {
        match fetch {
            Fetch::Skipped => None,
            Fetch::Done(v) => {
                self.used.push(source.to_string());
                Some(v)
            }
            Fetch::Failed => {
                self.failed.push(source.to_string());
                None
            }
        }
    }
}

/// Context gathered for one request.
#[derive(Default)]
struct Assembled {
    primary: Option<ContextObject>,
    activity: Option<ActivityContext>,
    hits: Vec<SemanticHit>,
    slices: StructuredSlices,
    ledger: SourceLedger,
}

fn context_ref(obj: &ContextObject) -> ContextRef {
    ContextRef {
        kind: obj.kind(),
        id: obj.id().to_string(),
        title: obj.title(),
    }
}

impl Assembled {
    fn workspace_name(&self) -> Option<&str> {
        match &self.primary {
            Some(ContextObject::Workspace(w)) => Some(&w.name),
            Some(ContextObject::Unified(u)) => Some(&u.workspace.name),
            _ => None,
        }
    }

    /// Primary reference and supporting references. A unified context is
    /// reported through its anchor so a project anchor reads as a project.
    fn refs(&self) -> (Option<ContextRef>, Vec<ContextRef>) {
        let mut supporting = Vec::new();
        let primary = match &self.primary {
            Some(ContextObject::Unified(u)) => {
                let workspace = context_ref(&ContextObject::Workspace(u.workspace.clone()));
                match &u.anchor {
                    Some(UnifiedAnchor::Page(p)) => {
                        supporting.push(workspace);
                        Some(context_ref(&ContextObject::Page(p.clone())))
                    }
                    Some(UnifiedAnchor::Project(p)) => {
                        supporting.push(workspace);
                        Some(context_ref(&ContextObject::Project(p.clone())))
                    }
                    Some(UnifiedAnchor::Task { task, project }) => {
                        supporting.push(workspace);
                        if let Some(p) = project {
                            supporting.push(context_ref(&ContextObject::Project(p.clone())));
                        }
                        Some(context_ref(&ContextObject::Task(task.clone())))
                    }
                    None => Some(workspace),
                }
            }
            Some(other) => Some(context_ref(other)),
            None => None,
        };
        if let Some(a) = &self.activity {
            supporting.push(ContextRef {
                kind: ContextKind::Activity,
                id: a.header.id.clone(),
                title: "Recent activity".to_string(),
            });
        }
        (primary, supporting)
    }

    fn retrieved_count(&self) -> usize {
        let counts = self.slices.counts();
        self.primary.iter().count()
            + self.activity.iter().count()
            + self.hits.len()
            + counts.projects
            + counts.tasks
            + counts.epics
            + counts.documents
            + counts.people
    }
}

pub struct Orchestrator {
    engine: Arc<ContextEngine>,
    semantic: Option<Arc<SemanticIndex>>,
    llm: Arc<dyn LlmClient>,
    actions: Arc<dyn ActionAdapter>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    /// `semantic` is `None` when no embedding provider is configured;
    /// semantic search requests are then ignored.
    pub fn new(
        engine: Arc<ContextEngine>,
        semantic: Option<Arc<SemanticIndex>>,
        llm: Arc<dyn LlmClient>,
        actions: Arc<dyn ActionAdapter>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            engine,
            semantic,
            llm,
            actions,
            settings,
        }
    }

    fn executor(&self) -> CommandExecutor<'_> {
        CommandExecutor::new(
            self.actions.as_ref(),
            self.llm.as_ref(),
            SummarySettings {
                temperature: self.settings.temperature,
                max_tokens: self.settings.summary_max_tokens,
            },
        )
    }

    /// Returns the number of context items semantic search may return.
    fn validate(&self, req: &LoopRequest) -> LoopResult<usize> {
        if req.workspace_id.trim().is_empty() {
            return Err(LoopError::validation("workspaceId must not be empty"));
        }
        if req.user_id.trim().is_empty() {
            return Err(LoopError::validation("userId must not be empty"));
        }
        if req.query.trim().is_empty() {
            return Err(LoopError::validation("query must not be empty"));
        }
        match req.max_context_items {
            None => Ok(self.settings.default_context_items),
            Some(0) => Err(LoopError::validation("maxContextItems must be at least 1")),
            Some(n) => Ok(n.min(self.settings.max_context_items)),
        }
    }

    pub async fn handle(&self, req: LoopRequest) -> LoopResult<LoopResponse> {
        let started = Instant::now();
        let limit = self.validate(&req)?;
        let mode = resolve_mode(&req);
        let workspace_id = req.workspace_id.as_str();

        tracing::info!(
            workspace_id,
            user_id = %req.user_id,
            declared_mode = %req.mode,
            mode = %mode,
            "handling loop request"
        );

        if let Some(response) = self.try_direct_action(&req, mode, started).await {
            return Ok(response);
        }

        let assembled = self.assemble(&req, mode, limit).await;

        let disclose_actions = self.actions.is_available()
            && has_action_signal(&req.query, req.action_flag, req.action_channel.as_deref());
        let prompt = build_prompt(&PromptInput {
            mode,
            workspace_name: assembled.workspace_name(),
            query: &req.query,
            primary: assembled.primary.as_ref(),
            activity: assembled.activity.as_ref(),
            semantic_hits: &assembled.hits,
            slices: &assembled.slices,
            disclose_actions,
        });
        tracing::debug!(workspace_id, prompt = %truncate_for_log(&prompt, 400), "prompt built");

        let completion = self
            .llm
            .complete(CompletionRequest {
                system: self.settings.system_preamble.clone(),
                prompt,
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            })
            .await
            .map_err(|e| {
                tracing::error!(workspace_id, error = %e, "language model call failed");
                LoopError::from(e)
            })?;

        let execution = self.executor().execute(&completion.content).await;
        let token_usage = match (completion.usage, execution.usage) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };

        let (primary, supporting) = assembled.refs();
        let retrieved_count = assembled.retrieved_count();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            workspace_id,
            retrieved_count,
            actions = execution.outcomes.len(),
            elapsed_ms,
            "loop request answered"
        );

        Ok(LoopResponse {
            mode,
            workspace_id: req.workspace_id.clone(),
            user_id: req.user_id.clone(),
            query: req.query.clone(),
            context: ContextSummary {
                primary,
                supporting,
                sources_used: assembled.ledger.used,
                sources_failed: assembled.ledger.failed,
                semantic_hits: assembled
                    .hits
                    .iter()
                    .map(|h| SemanticHitSummary {
                        item_id: h.item_id.clone(),
                        context_id: h.context_id.clone(),
                        kind: h.kind,
                        title: h.title.clone(),
                        score: h.score,
                    })
                    .collect(),
                slices: assembled.slices.counts(),
            },
            answer: execution.text,
            suggestions: suggestions(mode, &req.anchors, self.actions.is_available()),
            metadata: ResponseMetadata {
                model: completion.model,
                token_usage,
                retrieved_count,
                declared_mode: req.mode,
                short_circuited: false,
                actions_executed: execution.outcomes,
                elapsed_ms,
            },
        })
    }

    /// Execute a query that is itself an action request. Returns `None` to
    /// continue with the normal pipeline, including when the action fails.
    async fn try_direct_action(
        &self,
        req: &LoopRequest,
        mode: LoopMode,
        started: Instant,
    ) -> Option<LoopResponse> {
        if !self.actions.is_available() {
            return None;
        }
        let command =
            detect_action_intent(&req.query, req.action_channel.as_deref(), req.action_flag)?;

        let run = self.executor().run(&command).await;
        if !run.outcome.ok {
            tracing::warn!(
                workspace_id = %req.workspace_id,
                verb = command.verb(),
                channel = command.channel(),
                "direct action failed; continuing with full pipeline"
            );
            return None;
        }
        tracing::info!(
            workspace_id = %req.workspace_id,
            verb = command.verb(),
            channel = command.channel(),
            "direct action executed"
        );

        Some(LoopResponse {
            mode,
            workspace_id: req.workspace_id.clone(),
            user_id: req.user_id.clone(),
            query: req.query.clone(),
            context: ContextSummary::default(),
            answer: run.replacement,
            suggestions: suggestions(mode, &req.anchors, true),
            metadata: ResponseMetadata {
                model: if run.usage.is_some() {
                    self.settings.model.clone()
                } else {
                    NO_MODEL.to_string()
                },
                token_usage: run.usage,
                retrieved_count: 0,
                declared_mode: req.mode,
                short_circuited: true,
                actions_executed: vec![run.outcome],
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        })
    }

    /// Fetch every source the mode calls for, concurrently.
    async fn assemble(&self, req: &LoopRequest, mode: LoopMode, limit: usize) -> Assembled {
        let ws = req.workspace_id.as_str();
        let user = req.user_id.as_str();
        let anchors = &req.anchors;
        let deadline = self.settings.source_timeout;
        let engine = self.engine.as_ref();

        let primary_source = match mode {
            LoopMode::Spaces => "unified",
            LoopMode::Org => "org",
            LoopMode::Dashboard => "workspace",
        };
        let primary = guarded(primary_source, ws, deadline, async {
            Ok::<_, anyhow::Error>(match mode {
                LoopMode::Spaces => engine
                    .unified_context(ws, anchors)
                    .await?
                    .map(ContextObject::from),
                LoopMode::Org => Some(ContextObject::from(
                    engine.org_context(ws, anchors.role(), anchors.team()).await?,
                )),
                LoopMode::Dashboard => engine.workspace_context(ws).await?.map(ContextObject::from),
            })
        });

        let want_activity = mode == LoopMode::Dashboard
            || (mode == LoopMode::Spaces && !anchors.has_entity_anchor());
        let activity = async {
            if !want_activity {
                return Fetch::Skipped;
            }
            guarded("activity", ws, deadline, engine.activity_context(ws)).await
        };

        let semantic = async {
            match (&self.semantic, req.use_semantic_search) {
                (Some(index), true) => {
                    guarded(
                        "semantic",
                        ws,
                        deadline,
                        index.search_similar(ws, &req.query, None, limit),
                    )
                    .await
                }
                (None, true) => {
                    tracing::debug!(workspace_id = ws, "semantic search requested but embeddings are disabled");
                    Fetch::Skipped
                }
                _ => Fetch::Skipped,
            }
        };

        let projects = guarded("projects", ws, deadline, engine.active_projects_slice(ws));

        let tasks = async {
            if mode != LoopMode::Dashboard {
                return Fetch::Skipped;
            }
            guarded("tasks", ws, deadline, engine.active_tasks_slice(ws, user)).await
        };

        let anchored = async {
            if mode != LoopMode::Spaces || !anchors.has_entity_anchor() {
                return Fetch::Skipped;
            }
            guarded("anchored_project", ws, deadline, async {
                match engine.anchored_project_id(ws, anchors).await? {
                    Some(pid) => engine.project_slice(ws, &pid).await,
                    None => Ok(ProjectSlice::default()),
                }
            })
            .await
        };

        let documents = async {
            if mode == LoopMode::Org {
                return Fetch::Skipped;
            }
            guarded("documents", ws, deadline, engine.personal_docs_slice(ws, user)).await
        };

        let people = async {
            if mode != LoopMode::Org {
                return Fetch::Skipped;
            }
            guarded("people", ws, deadline, engine.people_slice(ws)).await
        };

        let (primary, activity, semantic, projects, tasks, anchored, documents, people) = tokio::join!(
            primary, activity, semantic, projects, tasks, anchored, documents, people
        );

        let mut out = Assembled::default();
        let ledger = &mut out.ledger;

        out.primary = ledger.take(primary_source, primary).flatten();
        let foreign = out
            .primary
            .as_ref()
            .filter(|obj| !obj.is_scoped_to(ws))
            .map(|obj| obj.kind());
        if let Some(kind) = foreign {
            tracing::error!(workspace_id = ws, kind = %kind, "primary context crossed workspace boundary; dropped");
            ledger.used.retain(|s| s != primary_source);
            ledger.failed.push(primary_source.to_string());
            out.primary = None;
        }

        out.activity = ledger
            .take("activity", activity)
            .filter(|a| a.header.workspace_id == ws);

        out.hits = ledger.take("semantic", semantic).unwrap_or_default();
        out.hits.truncate(limit);

        out.slices.projects = ledger.take("projects", projects).unwrap_or_default();
        out.slices.tasks = ledger.take("tasks", tasks).unwrap_or_default();
        if let Some(slice) = ledger.take("anchored_project", anchored) {
            out.slices.epics = slice.epics;
            out.slices.tasks.extend(slice.tasks);
        }
        out.slices.documents = ledger.take("documents", documents).unwrap_or_default();
        out.slices.people = ledger.take("people", people).unwrap_or_default();

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_loop_core::api::Anchors;

    #[test]
    fn test_entity_anchor_forces_spaces() {
        let mut req = LoopRequest::new("ws1", "u1", LoopMode::Dashboard, "status?");
        assert_eq!(resolve_mode(&req), LoopMode::Dashboard);

        req.anchors = Anchors {
            project_id: Some("p1".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_mode(&req), LoopMode::Spaces);

        req.mode = LoopMode::Org;
        req.anchors = Anchors {
            team_id: Some("t1".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_mode(&req), LoopMode::Org);
    }
}
