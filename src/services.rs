//! Process-wide service graph.
//!
//! Providers and stores are built once at startup and shared behind `Arc`
//! by the CLI and the HTTP server.

use std::sync::Arc;

use anyhow::Result;

use context_loop_core::domain::DomainSource;
use context_loop_core::embedding::EmbeddingProvider;
use context_loop_core::store::ContextStore;

use crate::actions::{create_adapter, ActionAdapter};
use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::engine::ContextEngine;
use crate::error::{LoopError, LoopResult};
use crate::llm::{create_client, LlmClient};
use crate::migrate;
use crate::orchestrator::{Orchestrator, OrchestratorSettings};
use crate::semantic::SemanticIndex;
use crate::sqlite_domain::SqliteDomain;
use crate::sqlite_store::SqliteContextStore;

/// External providers, injected so tests can substitute fakes.
pub struct Providers {
    pub embeddings: Option<Arc<dyn EmbeddingProvider>>,
    pub llm: Arc<dyn LlmClient>,
    pub actions: Arc<dyn ActionAdapter>,
}

impl Providers {
    pub fn from_config(config: &Config) -> Result<Self> {
        let embeddings = if config.embedding.is_enabled() {
            Some(create_provider(&config.embedding)?)
        } else {
            None
        };
        Ok(Self {
            embeddings,
            llm: create_client(&config.llm)?,
            actions: create_adapter(&config.actions)?,
        })
    }
}

pub struct Services {
    pub config: Arc<Config>,
    pub store: Arc<dyn ContextStore>,
    pub engine: Arc<ContextEngine>,
    pub semantic: Option<Arc<SemanticIndex>>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Services {
    /// Open the database, make sure the schema exists, and build every
    /// provider named in the config.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;

        let store: Arc<dyn ContextStore> = Arc::new(SqliteContextStore::with_candidate_pool(
            pool.clone(),
            config.retrieval.candidate_pool,
        ));
        let domain: Arc<dyn DomainSource> = Arc::new(SqliteDomain::new(pool));
        let providers = Providers::from_config(config)?;

        tracing::info!(
            db = %config.db.path.display(),
            embedding = %config.embedding.provider,
            llm = %config.llm.provider,
            actions = %config.actions.provider,
            "services initialized"
        );
        Ok(Self::new(config.clone(), store, domain, providers))
    }

    pub fn new(
        config: Config,
        store: Arc<dyn ContextStore>,
        domain: Arc<dyn DomainSource>,
        providers: Providers,
    ) -> Self {
        let engine = Arc::new(ContextEngine::new(
            domain,
            store.clone(),
            config.retrieval.clone(),
        ));
        let semantic = providers
            .embeddings
            .map(|p| Arc::new(SemanticIndex::new(store.clone(), p)));
        let orchestrator = Arc::new(Orchestrator::new(
            engine.clone(),
            semantic.clone(),
            providers.llm,
            providers.actions,
            OrchestratorSettings::from_config(&config),
        ));

        Self {
            config: Arc::new(config),
            store,
            engine,
            semantic,
            orchestrator,
        }
    }

    /// The semantic index, or a validation error when embeddings are off.
    pub fn semantic(&self) -> LoopResult<&Arc<SemanticIndex>> {
        self.semantic.as_ref().ok_or_else(|| {
            LoopError::validation("embeddings are disabled; set [embedding] provider in the config")
        })
    }
}
