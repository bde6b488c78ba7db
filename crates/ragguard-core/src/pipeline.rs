//! Single-query state machine.
//!
//! ```text
//! INIT → INPUT_GATE ─┬─ refused ──────────────────────────────→ DONE
//!                    └→ RETRIEVAL → CONFIDENCE_GATE ─┬─ refused → DONE
//!                                                   └→ GENERATION
//! GENERATION ─┬─ timeout / error ──────────→ DONE
//!             ├─ rate limited ─────────────→ propagated to caller
//!             └→ OUTPUT_GATE ─┬─ refused ──→ DONE
//!                             └→ SCORED ───→ DONE
//! ```
//!
//! At most one generation call is issued per invocation. Every terminal
//! state produces a [`PipelineResult`] and records exactly one outcome in the
//! caller's [`EvaluationStats`]; a propagated rate limit records nothing, so
//! retries are not double counted.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::collaborators::{GenerationError, Generator, Retriever};
use crate::config::GuardConfig;
use crate::domain::{
    ErrorCode, EvalScores, Faithfulness, PipelineResult, Result, RetrievedChunk,
};
use crate::evaluator::{EvaluationStats, Evaluator};
use crate::guardrails::{evaluate_confidence, wrap_context, InputGuardrails, OutputGuardrails};
use crate::limits::{ExecutionLimiter, LimitError};
use crate::obs::{self, QuerySpan};
use crate::prompt::build_generation_prompt;
use crate::refusal::RefusalMapper;

/// Prefix of the answer surfaced for unclassified generation failures.
pub const GENERATION_ERROR_PREFIX: &str = "Generation Error: ";

/// Guarded question answering over a retriever and a generator.
pub struct QueryPipeline {
    config: Arc<GuardConfig>,
    input: InputGuardrails,
    output: OutputGuardrails,
    refusals: RefusalMapper,
    limiter: ExecutionLimiter,
    evaluator: Evaluator,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
}

impl std::fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("limiter", &self.limiter)
            .field("evaluator", &self.evaluator)
            .finish_non_exhaustive()
    }
}

impl QueryPipeline {
    /// Validate `config`, compile its rule tables and wire collaborators.
    pub fn new(
        config: GuardConfig,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        Ok(Self {
            input: InputGuardrails::from_config(&config)?,
            output: OutputGuardrails::from_config(&config),
            refusals: RefusalMapper::new(config.refusals.clone()),
            limiter: ExecutionLimiter::new(config.llm_timeout()),
            evaluator: Evaluator::new(config.clone()),
            config,
            retriever,
            generator,
        })
    }

    /// Judge faithfulness with `model` instead of the heuristic alone.
    pub fn with_evaluator_model(mut self, model: Arc<dyn Generator>) -> Self {
        self.evaluator = self.evaluator.with_model(model);
        self
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn input_guardrails(&self) -> &InputGuardrails {
        &self.input
    }

    pub fn refusals(&self) -> &RefusalMapper {
        &self.refusals
    }

    /// Run one query through every stage.
    ///
    /// Only [`GenerationError::RateLimited`] is returned as an error; every
    /// other failure becomes a terminal result.
    pub async fn run_query(
        &self,
        query: &str,
        skip_faithfulness: bool,
        stats: &mut EvaluationStats,
    ) -> std::result::Result<PipelineResult, GenerationError> {
        let span = QuerySpan::new();
        self.run_stages(query, skip_faithfulness, stats)
            .instrument(span.span().clone())
            .await
    }

    async fn run_stages(
        &self,
        query: &str,
        skip_faithfulness: bool,
        stats: &mut EvaluationStats,
    ) -> std::result::Result<PipelineResult, GenerationError> {
        let started = Instant::now();
        obs::emit_query_started(query.chars().count(), skip_faithfulness);

        // INPUT_GATE
        let verdict = self.input.check(query);
        let mut triggered = verdict.codes();
        if let Some(code) = verdict.blocking_code() {
            let result = self.refuse(query, code, triggered, &[], 0.0);
            return Ok(self.finish(result, started, false, stats));
        }
        let sanitized = verdict.sanitized;

        // RETRIEVAL
        let chunks = match self.retriever.retrieve(&sanitized).await {
            Ok(chunks) => chunks,
            Err(err) => {
                tracing::warn!(error = %err, "retrieval failed; treating as empty");
                Vec::new()
            }
        };

        // CONFIDENCE_GATE
        let confidence = evaluate_confidence(&chunks, self.config.retrieval_confidence_threshold);
        let relevance = confidence.average_relevance;
        if let Some(code) = confidence.code {
            let detail = match confidence.top_score {
                Some(score) => format!("top score {score:.3} below threshold"),
                None => "no chunks retrieved".to_string(),
            };
            obs::emit_guardrail_triggered(code, Some(detail.as_str()));
            triggered.push(code);
            let result = self.refuse(query, code, triggered, &chunks, relevance);
            return Ok(self.finish(result, started, true, stats));
        }

        // GENERATION
        let wrapped = wrap_context(&chunks);
        let prompt = build_generation_prompt(&self.config, &wrapped, &sanitized);
        let generator = self.generator.clone();
        let deadline = self.limiter.limit();

        let generated = self
            .limiter
            .run(async move { generator.generate(&prompt, deadline).await })
            .await;

        let answer = match generated {
            Ok(Ok(answer)) => answer,
            Ok(Err(err @ GenerationError::RateLimited { .. })) => {
                tracing::warn!(error = %err, "generation rate limited");
                return Err(err);
            }
            Ok(Err(GenerationError::Failed { detail })) | Err(LimitError::Aborted { detail }) => {
                tracing::error!(error = %detail, "generation failed");
                triggered.push(ErrorCode::LlmError);
                let result = PipelineResult {
                    query: query.to_string(),
                    answer: format!("{GENERATION_ERROR_PREFIX}{detail}"),
                    guardrails_triggered: triggered,
                    error_code: Some(ErrorCode::LlmError),
                    chunks: contents(&chunks),
                    citations: BTreeSet::new(),
                    eval: EvalScores::unscored(relevance),
                };
                return Ok(self.finish(result, started, true, stats));
            }
            Err(LimitError::Timeout { .. }) => {
                triggered.push(ErrorCode::LlmTimeout);
                let result =
                    self.refuse(query, ErrorCode::LlmTimeout, triggered, &chunks, relevance);
                return Ok(self.finish(result, started, true, stats));
            }
        };

        // OUTPUT_GATE
        let output = self.output.check(&answer);
        if let Some(code) = output.code() {
            triggered.extend(output.findings.iter().map(|f| f.code));
            let result = self.refuse(query, code, triggered, &chunks, relevance);
            return Ok(self.finish(result, started, true, stats));
        }

        // SCORED
        let citations = if answer.to_lowercase().contains("i don't know") {
            BTreeSet::new()
        } else {
            chunks.iter().map(RetrievedChunk::citation).collect()
        };

        let faithfulness = if skip_faithfulness {
            Faithfulness::Skipped
        } else {
            self.evaluator
                .faithfulness(&sanitized, &answer, &wrapped)
                .await
        };
        stats.record_faithfulness(faithfulness);

        let result = PipelineResult {
            query: query.to_string(),
            answer,
            guardrails_triggered: triggered,
            error_code: None,
            chunks: contents(&chunks),
            citations,
            eval: EvalScores {
                faithfulness,
                relevance,
            },
        };
        Ok(self.finish(result, started, true, stats))
    }

    fn refuse(
        &self,
        query: &str,
        code: ErrorCode,
        triggered: Vec<ErrorCode>,
        chunks: &[RetrievedChunk],
        relevance: f64,
    ) -> PipelineResult {
        PipelineResult {
            query: query.to_string(),
            answer: self.refusals.refusal(code).to_string(),
            guardrails_triggered: triggered,
            error_code: Some(code),
            chunks: contents(chunks),
            citations: BTreeSet::new(),
            eval: EvalScores::unscored(relevance),
        }
    }

    /// Record the terminal outcome; relevance only counts once retrieval ran.
    fn finish(
        &self,
        result: PipelineResult,
        started: Instant,
        retrieved: bool,
        stats: &mut EvaluationStats,
    ) -> PipelineResult {
        stats.record_outcome(result.error_code);
        if retrieved {
            stats.record_relevance(result.eval.relevance);
        }
        obs::emit_query_finished(result.error_code, started.elapsed(), result.eval.relevance);
        result
    }
}

fn contents(chunks: &[RetrievedChunk]) -> Vec<String> {
    chunks.iter().map(|c| c.content.clone()).collect()
}
