//! Domain-level error taxonomy for RagGuard.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed vocabulary of guardrail and pipeline failure codes.
///
/// The serialized form is the SCREAMING_CASE name, which is also what the
/// persisted report and the stats dashboard print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    QueryTooLong,
    OffTopic,
    PiiDetected,
    RetrievalEmpty,
    LlmTimeout,
    LlmError,
    PolicyBlock,
    RateLimit,
}

impl ErrorCode {
    /// Every code, in taxonomy order.
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::QueryTooLong,
        ErrorCode::OffTopic,
        ErrorCode::PiiDetected,
        ErrorCode::RetrievalEmpty,
        ErrorCode::LlmTimeout,
        ErrorCode::LlmError,
        ErrorCode::PolicyBlock,
        ErrorCode::RateLimit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::QueryTooLong => "QUERY_TOO_LONG",
            ErrorCode::OffTopic => "OFF_TOPIC",
            ErrorCode::PiiDetected => "PII_DETECTED",
            ErrorCode::RetrievalEmpty => "RETRIEVAL_EMPTY",
            ErrorCode::LlmTimeout => "LLM_TIMEOUT",
            ErrorCode::LlmError => "LLM_ERROR",
            ErrorCode::PolicyBlock => "POLICY_BLOCK",
            ErrorCode::RateLimit => "RATE_LIMIT",
        }
    }

    /// Whether an input finding with this code stops the query.
    ///
    /// PII detection sanitizes the query instead of refusing it.
    pub fn is_blocking(self) -> bool {
        !matches!(self, ErrorCode::PiiDetected)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorCode {
    type Err = RagGuardError;

    fn from_str(s: &str) -> Result<Self> {
        ErrorCode::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| RagGuardError::UnknownErrorCode(s.to_string()))
    }
}

/// RagGuard domain errors.
#[derive(Debug, thiserror::Error)]
pub enum RagGuardError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown error code: {0}")]
    UnknownErrorCode(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config render error: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for RagGuard domain operations.
pub type Result<T> = std::result::Result<T, RagGuardError>;
