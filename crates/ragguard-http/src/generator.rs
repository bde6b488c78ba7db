//! Chat completions client implementing the core `Generator` seam.
//!
//! Sends one user message to `POST {base_url}/chat/completions` and returns
//! `choices[0].message.content`. Retrying is the orchestrator's job, so this
//! client makes exactly one request per call:
//! - HTTP 429 → `GenerationError::RateLimited`
//! - any other non-2xx, network error or malformed body → `GenerationError::Failed`

use std::time::Duration;

use async_trait::async_trait;
use ragguard_core::{GenerationError, Generator};
use reqwest::StatusCode;
use tracing::debug;

use crate::config::LlmEndpoint;
use crate::error::Result;

/// Generator backed by an OpenAI-compatible chat completions API.
pub struct OpenAiChatGenerator {
    client: reqwest::Client,
    endpoint: LlmEndpoint,
}

impl OpenAiChatGenerator {
    pub fn new(endpoint: LlmEndpoint) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &LlmEndpoint {
        &self.endpoint
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.endpoint.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.endpoint.temperature,
            "max_tokens": self.endpoint.max_tokens,
        })
    }
}

#[async_trait]
impl Generator for OpenAiChatGenerator {
    async fn generate(
        &self,
        prompt: &str,
        deadline: Duration,
    ) -> std::result::Result<String, GenerationError> {
        debug!(
            model = %self.endpoint.model,
            prompt_chars = prompt.chars().count(),
            "chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint.completions_url())
            .header("Authorization", format!("Bearer {}", self.endpoint.api_key))
            .header("Content-Type", "application/json")
            .timeout(deadline)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| GenerationError::failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body_text));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::failed(format!("invalid response body: {e}")))?;
        parse_completion(&json)
    }
}

/// Map a non-success HTTP status to a generation error.
pub fn classify_status(status: StatusCode, body: &str) -> GenerationError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body.trim())
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        GenerationError::rate_limited(detail)
    } else {
        GenerationError::failed(format!("API error {detail}"))
    }
}

/// Extract `choices[0].message.content` from a completion response.
pub fn parse_completion(json: &serde_json::Value) -> std::result::Result<String, GenerationError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::failed(
                "invalid completion response: missing choices[0].message.content",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_many_requests_is_rate_limited() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("slow down"));
    }

    #[test]
    fn test_other_statuses_fail() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::INTERNAL_SERVER_ERROR] {
            let err = classify_status(status, "");
            assert!(!err.is_rate_limited());
            assert!(err.to_string().starts_with("API error"));
        }
    }

    #[test]
    fn test_parse_completion() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Yield to pedestrians." } }]
        });
        assert_eq!(parse_completion(&json).unwrap(), "Yield to pedestrians.");
    }

    #[test]
    fn test_parse_completion_rejects_empty_choices() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_completion(&json).is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let generator =
            OpenAiChatGenerator::new(LlmEndpoint::new("http://localhost:1/v1", "k", "m")).unwrap();
        let body = generator.request_body("hello");
        assert_eq!(body["model"], "m");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["max_tokens"], 512);
    }
}
