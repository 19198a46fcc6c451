//! TOML configuration.
//!
//! Only `[db]` is required; every other section falls back to defaults so a
//! two-line config runs the service with providers disabled.
//!
//! ```toml
//! [db]
//! path = "./data/loop.sqlite"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//! ```
//!
//! Secrets never live in the file: the LLM key comes from `LLM_API_KEY` (or
//! `OPENAI_API_KEY`), the embedding key from `OPENAI_API_KEY`, and the Slack
//! token from `SLACK_BOT_TOKEN`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Most stored vectors a single similarity search scores.
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,
    #[serde(default = "default_context_items")]
    pub default_context_items: usize,
    #[serde(default = "default_max_context_items")]
    pub max_context_items: usize,
    /// Related documents attached to a page context.
    #[serde(default = "default_related_limit")]
    pub related_limit: usize,
    /// Recent pages and activity events per workspace snapshot.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_pool: default_candidate_pool(),
            default_context_items: default_context_items(),
            max_context_items: default_max_context_items(),
            related_limit: default_related_limit(),
            recent_limit: default_recent_limit(),
        }
    }
}

fn default_candidate_pool() -> usize {
    500
}
fn default_context_items() -> usize {
    10
}
fn default_max_context_items() -> usize {
    50
}
fn default_related_limit() -> usize {
    5
}
fn default_recent_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackfillConfig {
    /// Items fetched from the store per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Items embedded before pausing.
    #[serde(default = "default_backfill_batch")]
    pub batch_size: usize,
    /// Pause between sub-batches, in milliseconds.
    #[serde(default = "default_backfill_delay")]
    pub delay_ms: u64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            batch_size: default_backfill_batch(),
            delay_ms: default_backfill_delay(),
        }
    }
}

fn default_page_size() -> usize {
    100
}
fn default_backfill_batch() -> usize {
    10
}
fn default_backfill_delay() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    /// Chat-completions URL of an OpenAI-compatible API.
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Budget for the follow-up call that summarizes fetched messages.
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            summary_max_tokens: default_summary_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1200
}
fn default_summary_max_tokens() -> u32 {
    300
}
fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ActionsConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_slack_api")]
    pub api_base: String,
    #[serde(default = "default_action_timeout")]
    pub timeout_secs: u64,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            api_base: default_slack_api(),
            timeout_secs: default_action_timeout(),
        }
    }
}

fn default_slack_api() -> String {
    "https://slack.com/api".to_string()
}
fn default_action_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrchestratorConfig {
    /// Deadline for each concurrent context sub-fetch.
    #[serde(default = "default_source_timeout")]
    pub source_timeout_ms: u64,
    /// Replaces the built-in system preamble when set.
    #[serde(default)]
    pub system_preamble: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            source_timeout_ms: default_source_timeout(),
            system_preamble: None,
        }
    }
}

fn default_source_timeout() -> u64 {
    4000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Config for an in-memory database with every provider disabled.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from(":memory:"),
            },
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            backfill: BackfillConfig::default(),
            llm: LlmConfig::default(),
            actions: ActionsConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let r = &config.retrieval;
    if r.candidate_pool == 0 {
        bail!("retrieval.candidate_pool must be >= 1");
    }
    if r.max_context_items == 0 {
        bail!("retrieval.max_context_items must be >= 1");
    }
    if r.default_context_items == 0 || r.default_context_items > r.max_context_items {
        bail!("retrieval.default_context_items must be in [1, retrieval.max_context_items]");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    if config.backfill.page_size == 0 || config.backfill.batch_size == 0 {
        bail!("backfill.page_size and backfill.batch_size must be >= 1");
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!("Unknown llm provider: '{}'. Must be disabled or openai.", other),
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.max_tokens == 0 {
        bail!("llm.max_tokens must be > 0");
    }

    match config.actions.provider.as_str() {
        "disabled" | "slack" => {}
        other => bail!("Unknown actions provider: '{}'. Must be disabled or slack.", other),
    }

    match config.logging.format.as_str() {
        "pretty" | "json" => {}
        other => bail!("logging.format must be pretty or json, got '{}'", other),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let cfg = parse_config("[db]\npath = \"./data/loop.sqlite\"\n").unwrap();
        assert_eq!(cfg.retrieval.candidate_pool, 500);
        assert_eq!(cfg.retrieval.default_context_items, 10);
        assert_eq!(cfg.backfill.batch_size, 10);
        assert_eq!(cfg.backfill.delay_ms, 1000);
        assert_eq!(cfg.orchestrator.source_timeout_ms, 4000);
        assert!(!cfg.embedding.is_enabled());
        assert_eq!(cfg.llm.provider, "disabled");
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let err = parse_config(
            "[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\nmodel = \"m\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_unknown_providers_are_rejected() {
        assert!(parse_config("[db]\npath = \"x\"\n[llm]\nprovider = \"magic\"\n").is_err());
        assert!(parse_config("[db]\npath = \"x\"\n[actions]\nprovider = \"irc\"\n").is_err());
        assert!(parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"local\"\n").is_err());
    }

    #[test]
    fn test_context_item_bounds() {
        let err = parse_config(
            "[db]\npath = \"x\"\n[retrieval]\ndefault_context_items = 80\nmax_context_items = 50\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("default_context_items"));
    }
}
