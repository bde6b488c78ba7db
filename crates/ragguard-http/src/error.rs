//! Error types for ragguard-http

use thiserror::Error;

/// Errors that can occur while configuring the HTTP adapters.
///
/// Request-time failures are reported through the core
/// `GenerationError`/`RetrievalError` types instead.
#[derive(Error, Debug)]
pub enum HttpError {
    /// Required environment variables are unset or empty
    #[error("missing environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    /// Environment variable holds an unusable value
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result type alias for ragguard-http
pub type Result<T> = std::result::Result<T, HttpError>;
