//! JSON search client implementing the core `Retriever` seam.
//!
//! Request: `POST {url}` with `{"query": "...", "limit": top_k}`.
//! Response: `{"results": [{"content" | "snippet", "score"?, "source"?, "page"?}]}`.

use std::time::Duration;

use async_trait::async_trait;
use ragguard_core::{RetrievalError, RetrievedChunk, Retriever};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RetrieverEndpoint;
use crate::error::Result;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(alias = "snippet")]
    content: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    page: Option<u32>,
}

impl From<SearchHit> for RetrievedChunk {
    fn from(hit: SearchHit) -> Self {
        RetrievedChunk {
            content: hit.content,
            score: hit.score,
            source: hit.source.unwrap_or_else(|| "Unknown".to_string()),
            page: hit.page,
        }
    }
}

/// Retriever backed by an HTTP search service.
pub struct HttpRetriever {
    client: reqwest::Client,
    endpoint: RetrieverEndpoint,
}

impl HttpRetriever {
    pub fn new(endpoint: RetrieverEndpoint) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(
        &self,
        query: &str,
    ) -> std::result::Result<Vec<RetrievedChunk>, RetrievalError> {
        let unavailable = |detail: String| RetrievalError::Unavailable { detail };

        let response = self
            .client
            .post(&self.endpoint.url)
            .json(&SearchRequest {
                query,
                limit: self.endpoint.top_k,
            })
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("{}: {}", status, body_text.trim())));
        }

        let body = response.text().await.map_err(|e| unavailable(e.to_string()))?;
        let chunks = parse_search_response(&body)?;
        debug!(count = chunks.len(), "retrieval complete");
        Ok(chunks)
    }
}

/// Decode a search response body into ranked chunks.
pub fn parse_search_response(
    body: &str,
) -> std::result::Result<Vec<RetrievedChunk>, RetrievalError> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| RetrievalError::Unavailable {
            detail: format!("invalid search response: {e}"),
        })?;
    Ok(parsed.results.into_iter().map(RetrievedChunk::from).collect())
}
