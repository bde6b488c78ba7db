//! ragguard-http: network adapters for the ragguard pipeline.
//!
//! - [`OpenAiChatGenerator`]: OpenAI-compatible chat completions (Groq by default)
//! - [`HttpRetriever`]: JSON search service returning ranked passages
//!
//! Both are configured from environment variables, see [`config`].

pub mod config;
pub mod error;
pub mod generator;
pub mod retriever;

pub use config::{missing_env_vars, LlmEndpoint, RetrieverEndpoint};
pub use error::{HttpError, Result};
pub use generator::OpenAiChatGenerator;
pub use retriever::HttpRetriever;
