//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/v1/loop` | Answer an assistant query |
//! | `POST` | `/v1/search` | Semantic search over cached context |
//! | `POST` | `/v1/embed` | (Re-)embed one cached context item |
//! | `GET`  | `/v1/context/{workspace_id}` | List cached context items |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Codes: `bad_request` (400), `forbidden` (403), `not_found` (404),
//! `provider_error` (502), `internal` (500). Messages other than
//! `bad_request` are generic; the details are logged.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use context_loop_core::api::{LoopRequest, LoopResponse};
use context_loop_core::models::ContextKind;
use context_loop_core::store::ContextItemRecord;

use crate::config::Config;
use crate::error::LoopError;
use crate::semantic::{EmbedOutcome, SemanticHit};
use crate::services::Services;

const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

/// Start the server on `[server].bind` and run until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Arc::new(Services::from_config(config).await?);
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "context loop server listening");
    axum::serve(listener, router(services)).await?;

    Ok(())
}

pub fn router(services: Arc<Services>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/v1/loop", post(handle_loop))
        .route("/v1/search", post(handle_search))
        .route("/v1/embed", post(handle_embed))
        .route("/v1/context/{workspace_id}", get(handle_list_context))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(services)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<LoopError> for AppError {
    fn from(err: LoopError) -> Self {
        let status = match &err {
            LoopError::Validation(_) => StatusCode::BAD_REQUEST,
            LoopError::NotFound(_) => StatusCode::NOT_FOUND,
            LoopError::TenantMismatch { .. } => StatusCode::FORBIDDEN,
            LoopError::Embedding(_) | LoopError::Llm(_) => {
                StatusCode::BAD_GATEWAY
            }
            LoopError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "request failed");
        } else {
            tracing::debug!(code = err.code(), error = %err, "request rejected");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.public_message(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /v1/loop ============

/// The body is decoded by hand so malformed requests get the standard
/// error body instead of axum's plain-text rejection.
async fn handle_loop(
    State(services): State<Arc<Services>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<LoopResponse>, AppError> {
    let request: LoopRequest =
        serde_json::from_value(body).map_err(|e| bad_request(format!("invalid request: {}", e)))?;
    let response = services.orchestrator.handle(request).await?;
    Ok(Json(response))
}

// ============ POST /v1/search ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    workspace_id: String,
    query: String,
    #[serde(default, rename = "type")]
    kind: Option<ContextKind>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SemanticHit>,
}

async fn handle_search(
    State(services): State<Arc<Services>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SearchResponse>, AppError> {
    let req: SearchRequest =
        serde_json::from_value(body).map_err(|e| bad_request(format!("invalid request: {}", e)))?;
    if req.workspace_id.trim().is_empty() {
        return Err(bad_request("workspaceId must not be empty"));
    }

    let limit = req
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, services.config.retrieval.max_context_items);
    let results = services
        .semantic()?
        .search_similar(&req.workspace_id, &req.query, req.kind, limit)
        .await?;
    Ok(Json(SearchResponse { results }))
}

// ============ POST /v1/embed ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    workspace_id: String,
    item_id: String,
}

async fn handle_embed(
    State(services): State<Arc<Services>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<EmbedOutcome>, AppError> {
    let req: EmbedRequest =
        serde_json::from_value(body).map_err(|e| bad_request(format!("invalid request: {}", e)))?;
    if req.workspace_id.trim().is_empty() || req.item_id.trim().is_empty() {
        return Err(bad_request("workspaceId and itemId must not be empty"));
    }
    let outcome = services
        .semantic()?
        .embed_context_item(&req.workspace_id, &req.item_id)
        .await?;
    Ok(Json(outcome))
}

// ============ GET /v1/context/{workspace_id} ============

#[derive(Deserialize)]
struct ListParams {
    #[serde(default, rename = "type")]
    kind: Option<ContextKind>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

#[derive(Serialize)]
struct ListResponse {
    total: usize,
    items: Vec<ContextItemRecord>,
}

async fn handle_list_context(
    State(services): State<Arc<Services>>,
    Path(workspace_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let total = services
        .store
        .count(&workspace_id, params.kind)
        .await
        .map_err(LoopError::from)?;
    let items = services
        .store
        .list(&workspace_id, params.kind, limit, offset)
        .await
        .map_err(LoopError::from)?;
    Ok(Json(ListResponse { total, items }))
}
