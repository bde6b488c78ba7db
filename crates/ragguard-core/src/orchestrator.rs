//! Sequential batch driver with rate-limit retries.
//!
//! Queries run one at a time. After the first, each query waits the
//! configured inter-query delay. A rate-limited query is retried in place
//! with linear backoff; once retries are exhausted it becomes a terminal
//! `LLM_ERROR` result instead of an error.

use std::collections::BTreeSet;

use crate::collaborators::GenerationError;
use crate::config::BatchConfig;
use crate::domain::{ErrorCode, EvalScores, PipelineResult};
use crate::evaluator::EvaluationStats;
use crate::obs;
use crate::pipeline::{QueryPipeline, GENERATION_ERROR_PREFIX};

#[derive(Debug)]
pub struct BatchOrchestrator {
    pipeline: QueryPipeline,
    batch: BatchConfig,
}

impl BatchOrchestrator {
    /// Drive `pipeline` with the batch policy from its own configuration.
    pub fn new(pipeline: QueryPipeline) -> Self {
        let batch = pipeline.config().batch.clone();
        Self { pipeline, batch }
    }

    pub fn with_batch_config(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn pipeline(&self) -> &QueryPipeline {
        &self.pipeline
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch
    }

    /// Run one query, retrying on rate limits.
    ///
    /// Makes at most `max_retries + 1` pipeline invocations.
    pub async fn run_one(
        &self,
        query: &str,
        skip_faithfulness: bool,
        stats: &mut EvaluationStats,
    ) -> PipelineResult {
        let max_retries = self.batch.max_retries;
        let mut attempt = 0;

        loop {
            match self.pipeline.run_query(query, skip_faithfulness, stats).await {
                Ok(result) => return result,
                Err(err) if attempt < max_retries => {
                    let delay = self.batch.backoff_delay(attempt);
                    obs::emit_retry_scheduled(attempt + 1, max_retries, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    tracing::debug!(error = %err, attempt, "retrying query");
                }
                Err(err) => {
                    tracing::error!(error = %err, attempts = attempt + 1, "retries exhausted");
                    let result = exhausted_result(query, &err);
                    stats.record_outcome(result.error_code);
                    return result;
                }
            }
        }
    }

    /// Run `queries` in order; see [`run_batch_with`](Self::run_batch_with).
    pub async fn run_batch(
        &self,
        queries: &[String],
        stats: &mut EvaluationStats,
    ) -> Vec<PipelineResult> {
        self.run_batch_with(queries, stats, |_| {}).await
    }

    /// Run `queries` in order, reporting a [`BatchEvent`] when each query
    /// starts (after its pacing delay) and when it finishes.
    ///
    /// Positions listed in `skip_faithfulness` are not faithfulness scored.
    pub async fn run_batch_with<F>(
        &self,
        queries: &[String],
        stats: &mut EvaluationStats,
        mut on_event: F,
    ) -> Vec<PipelineResult>
    where
        F: FnMut(BatchEvent<'_>),
    {
        let mut results = Vec::with_capacity(queries.len());

        for (position, query) in queries.iter().enumerate() {
            if position > 0 {
                tokio::time::sleep(self.batch.inter_query_delay()).await;
            }
            tracing::info!(position = position + 1, total = queries.len(), "processing query");
            on_event(BatchEvent::Started { position, query });

            let skip = self.batch.skip_faithfulness.contains(&position);
            let result = self.run_one(query, skip, stats).await;
            on_event(BatchEvent::Finished {
                position,
                result: &result,
            });
            results.push(result);
        }

        results
    }
}

/// Progress of a batch run, zero-based positions.
#[derive(Debug, Clone, Copy)]
pub enum BatchEvent<'a> {
    Started { position: usize, query: &'a str },
    Finished { position: usize, result: &'a PipelineResult },
}

fn exhausted_result(query: &str, err: &GenerationError) -> PipelineResult {
    PipelineResult {
        query: query.to_string(),
        answer: format!("{GENERATION_ERROR_PREFIX}{err}"),
        guardrails_triggered: vec![ErrorCode::LlmError],
        error_code: Some(ErrorCode::LlmError),
        chunks: Vec::new(),
        citations: BTreeSet::new(),
        eval: EvalScores::unscored(0.0),
    }
}
