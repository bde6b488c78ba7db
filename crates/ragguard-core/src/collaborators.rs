//! Seams to the external collaborators: retriever and generator.
//!
//! Both are object-safe async traits so the pipeline can hold them as
//! `Arc<dyn ...>` and tests can swap in scripted fakes.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::RetrievedChunk;

/// Failure of a generation call.
///
/// Rate limiting is its own variant so callers can retry it without
/// string matching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("rate limited: {detail}")]
    RateLimited { detail: String },

    #[error("{detail}")]
    Failed { detail: String },
}

impl GenerationError {
    pub fn rate_limited(detail: impl Into<String>) -> Self {
        GenerationError::RateLimited {
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        GenerationError::Failed {
            detail: detail.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GenerationError::RateLimited { .. })
    }
}

/// Failure of a retrieval call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetrievalError {
    #[error("retriever unavailable: {detail}")]
    Unavailable { detail: String },
}

/// Ranked passage search over the knowledge base.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Chunks for `query`, best first. May be empty; scores are optional.
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, RetrievalError>;
}

/// Text generation by a language model.
///
/// Also used as the optional evaluator model.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete `prompt`. `deadline` is the caller's time budget; the caller
    /// enforces it regardless of whether the implementation honours it.
    async fn generate(&self, prompt: &str, deadline: Duration) -> Result<String, GenerationError>;
}
