//! Endpoint configuration read from the environment.
//!
//! | Variable | Required | Default |
//! |---|---|---|
//! | `GROQ_API_KEY` | yes | |
//! | `RAGGUARD_LLM_BASE_URL` | no | `https://api.groq.com/openai/v1` |
//! | `RAGGUARD_LLM_MODEL` | no | `llama-3.3-70b-versatile` |
//! | `RAGGUARD_EVAL_MODEL` | no | same as `RAGGUARD_LLM_MODEL` |
//! | `RAGGUARD_RETRIEVER_URL` | yes | |
//! | `RAGGUARD_RETRIEVER_TOP_K` | no | `4` |

use serde::{Deserialize, Serialize};

use crate::error::{HttpError, Result};

pub const ENV_API_KEY: &str = "GROQ_API_KEY";
pub const ENV_LLM_BASE_URL: &str = "RAGGUARD_LLM_BASE_URL";
pub const ENV_LLM_MODEL: &str = "RAGGUARD_LLM_MODEL";
pub const ENV_EVAL_MODEL: &str = "RAGGUARD_EVAL_MODEL";
pub const ENV_RETRIEVER_URL: &str = "RAGGUARD_RETRIEVER_URL";
pub const ENV_RETRIEVER_TOP_K: &str = "RAGGUARD_RETRIEVER_TOP_K";

/// Variables that must be set before any network adapter can be built.
pub const REQUIRED_ENV: [&str; 2] = [ENV_API_KEY, ENV_RETRIEVER_URL];

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_TOP_K: usize = 4;

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmEndpoint {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmEndpoint {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: 0.1,
            max_tokens: 512,
        }
    }

    /// Generation endpoint from the environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Evaluator endpoint: the generation endpoint with `RAGGUARD_EVAL_MODEL`
    /// swapped in when set.
    pub fn evaluator_from_env() -> Result<Self> {
        let mut endpoint = Self::from_env()?;
        if let Some(model) = non_empty(std::env::var(ENV_EVAL_MODEL).ok()) {
            endpoint.model = model;
        }
        // The evaluator answers a single word.
        endpoint.temperature = 0.0;
        Ok(endpoint)
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = non_empty(lookup(ENV_API_KEY))
            .ok_or_else(|| HttpError::MissingEnv(vec![ENV_API_KEY.to_string()]))?;
        let base_url =
            non_empty(lookup(ENV_LLM_BASE_URL)).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = non_empty(lookup(ENV_LLM_MODEL)).unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self::new(&base_url, &api_key, &model))
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// JSON search endpoint backing the retriever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieverEndpoint {
    pub url: String,
    pub top_k: usize,
}

impl RetrieverEndpoint {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = non_empty(lookup(ENV_RETRIEVER_URL))
            .ok_or_else(|| HttpError::MissingEnv(vec![ENV_RETRIEVER_URL.to_string()]))?;

        let top_k = match non_empty(lookup(ENV_RETRIEVER_TOP_K)) {
            Some(raw) => match raw.parse::<usize>() {
                Ok(k) if k > 0 => k,
                _ => {
                    return Err(HttpError::InvalidEnv {
                        name: ENV_RETRIEVER_TOP_K.to_string(),
                        value: raw,
                    })
                }
            },
            None => DEFAULT_TOP_K,
        };

        Ok(Self { url, top_k })
    }
}

/// Names of required variables that are unset or empty.
pub fn missing_env_vars() -> Vec<String> {
    missing_from(|name| std::env::var(name).ok())
}

fn missing_from(lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
    REQUIRED_ENV
        .iter()
        .filter(|name| non_empty(lookup(name)).is_none())
        .map(|name| name.to_string())
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
