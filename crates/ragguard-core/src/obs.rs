//! Structured observability hooks for the query lifecycle.
//!
//! This module provides:
//! - Query-scoped tracing spans via `QuerySpan`
//! - Emission functions for lifecycle events: start, guardrail trigger,
//!   finish, retry scheduling, generation timeout, degraded evaluation
//!
//! Events carry codes and short diagnostics only; raw query text is never
//! logged beyond the prefix the caller passes in a guardrail detail.

use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::ErrorCode;

/// Query-scoped span carrying a per-invocation id.
///
/// Async stages attach it with `Instrument`; synchronous callers may
/// [`enter`](Self::enter) it instead.
///
/// ```ignore
/// let span = QuerySpan::new();
/// run_stages().instrument(span.span().clone()).await;
/// // every event inside carries query_id = span.query_id()
/// ```
pub struct QuerySpan {
    query_id: Uuid,
    span: tracing::Span,
}

impl QuerySpan {
    /// Create a span tagged with a fresh query id.
    pub fn new() -> Self {
        let query_id = Uuid::new_v4();
        let span = tracing::info_span!("ragguard.query", query_id = %query_id);
        Self { query_id, span }
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Enter the span until the returned guard drops.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Default for QuerySpan {
    fn default() -> Self {
        Self::new()
    }
}

/// Emit event: query accepted by the pipeline.
pub fn emit_query_started(query_chars: usize, skip_faithfulness: bool) {
    info!(
        event = "query.started",
        query_chars = query_chars,
        skip_faithfulness = skip_faithfulness,
    );
}

/// Emit event: a guardrail fired (warning level).
pub fn emit_guardrail_triggered(code: ErrorCode, detail: Option<&str>) {
    warn!(
        event = "guardrail.triggered",
        code = %code,
        detail = detail.unwrap_or(""),
    );
}

/// Emit event: query reached a terminal state.
pub fn emit_query_finished(error_code: Option<ErrorCode>, duration: Duration, relevance: f64) {
    info!(
        event = "query.finished",
        error_code = error_code.map(ErrorCode::as_str).unwrap_or("none"),
        duration_ms = duration.as_millis() as u64,
        relevance = relevance,
    );
}

/// Emit event: a rate-limited query will be retried after `delay`.
pub fn emit_retry_scheduled(attempt: u32, max_retries: u32, delay: Duration) {
    warn!(
        event = "retry.scheduled",
        attempt = attempt,
        max_retries = max_retries,
        delay_secs = delay.as_secs(),
    );
}

/// Emit event: the generation deadline elapsed (warning level).
pub fn emit_generation_timeout(limit: Duration) {
    warn!(event = "generation.timeout", limit_ms = limit.as_millis() as u64);
}

/// Emit event: the evaluator model failed and a heuristic was used instead.
pub fn emit_evaluation_degraded(error: &dyn std::fmt::Display) {
    warn!(event = "evaluation.degraded", error = %error);
}
