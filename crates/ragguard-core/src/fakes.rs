//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `ScriptedRetriever` and `ScriptedGenerator`, which satisfy the
//! trait contracts without any network access and count their invocations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::collaborators::{GenerationError, Generator, RetrievalError, Retriever};
use crate::domain::RetrievedChunk;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// ScriptedRetriever
// ---------------------------------------------------------------------------

/// Retriever returning the same chunk list (or error) for every query.
#[derive(Debug)]
pub struct ScriptedRetriever {
    response: Result<Vec<RetrievedChunk>, RetrievalError>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl ScriptedRetriever {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            response: Ok(chunks),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing(detail: &str) -> Self {
        Self {
            response: Err(RetrievalError::Unavailable {
                detail: detail.to_string(),
            }),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Queries received so far, in call order.
    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl Retriever for ScriptedRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.queries).push(query.to_string());
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Generator that plays back scripted responses in order.
///
/// Once the script is used up every call returns `fallback`.
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    fallback: Result<String, GenerationError>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Err(GenerationError::failed("no scripted response")),
            latency: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `answer`.
    pub fn always(answer: &str) -> Self {
        Self::new(Vec::new()).with_fallback(Ok(answer.to_string()))
    }

    /// Always signals rate limiting.
    pub fn always_rate_limited() -> Self {
        Self::new(Vec::new()).with_fallback(Err(rate_limit_error()))
    }

    /// Signals rate limiting `times` times, then answers `answer` forever.
    pub fn rate_limited_then(times: usize, answer: &str) -> Self {
        let script = (0..times).map(|_| Err(rate_limit_error())).collect();
        Self::new(script).with_fallback(Ok(answer.to_string()))
    }

    pub fn with_fallback(mut self, fallback: Result<String, GenerationError>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Sleep for `latency` before every response.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

fn rate_limit_error() -> GenerationError {
    GenerationError::rate_limited("429 Too Many Requests")
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _deadline: Duration) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.prompts).push(prompt.to_string());

        let step = lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        step
    }
}
