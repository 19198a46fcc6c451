//! Request-level error taxonomy.
//!
//! Internal plumbing returns `anyhow::Result`; the orchestrator, semantic
//! index and HTTP layer speak [`LoopError`]. Every variant has a stable
//! machine code and a generic public message. Details stay in the log.

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum LoopError {
    /// Malformed request, rejected before any context work.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// An entity exists but belongs to another workspace.
    #[error("workspace mismatch for {entity}")]
    TenantMismatch { entity: String },

    #[error("embedding provider error: {0}")]
    Embedding(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LoopError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LoopError::Validation(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            LoopError::Validation(_) => "bad_request",
            LoopError::NotFound(_) => "not_found",
            LoopError::TenantMismatch { .. } => "forbidden",
            LoopError::Embedding(_) | LoopError::Llm(_) => "provider_error",
            LoopError::Internal(_) => "internal",
        }
    }

    /// Message safe to return to callers. Validation messages describe the
    /// caller's own input and are passed through; everything else is
    /// generic.
    pub fn public_message(&self) -> String {
        match self {
            LoopError::Validation(msg) => msg.clone(),
            LoopError::NotFound(_) => "the requested item was not found".to_string(),
            LoopError::TenantMismatch { .. } => "access denied".to_string(),
            LoopError::Embedding(_) => "the embedding service is unavailable".to_string(),
            LoopError::Llm(_) => "the assistant is temporarily unavailable".to_string(),
            LoopError::Internal(_) => "internal error".to_string(),
        }
    }
}

pub type LoopResult<T> = std::result::Result<T, LoopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_generic_messages() {
        let err = LoopError::TenantMismatch {
            entity: "context item abc".to_string(),
        };
        assert_eq!(err.code(), "forbidden");
        assert!(!err.public_message().contains("abc"));

        let err = LoopError::Internal(anyhow::anyhow!("db file /secret/path locked"));
        assert_eq!(err.code(), "internal");
        assert_eq!(err.public_message(), "internal error");

        for err in [
            LoopError::Embedding("429 from provider".to_string()),
            LoopError::Llm(LlmError::Http("connection refused".to_string())),
        ] {
            assert_eq!(err.code(), "provider_error");
        }

        assert_eq!(
            LoopError::validation("query must not be empty").public_message(),
            "query must not be empty"
        );
    }
}

