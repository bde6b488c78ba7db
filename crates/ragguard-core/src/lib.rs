//! RagGuard Core Library
//!
//! Guardrail and orchestration pipeline for retrieval-augmented question
//! answering. Every query passes input validation, retrieval-confidence
//! gating, deadline-bounded generation and output-integrity validation
//! before an answer is released; a batch driver re-issues queries under
//! upstream rate limiting.
//!
//! The retriever and the language model are external collaborators reached
//! through the [`Retriever`] and [`Generator`] traits.

pub mod collaborators;
pub mod config;
pub mod domain;
pub mod evaluator;
pub mod fakes;
pub mod guardrails;
pub mod limits;
pub mod obs;
pub mod orchestrator;
pub mod pipeline;
pub mod prompt;
pub mod refusal;
pub mod report;
pub mod telemetry;

pub use collaborators::{GenerationError, Generator, RetrievalError, Retriever};

pub use config::{load_config, parse_config, BatchConfig, GuardConfig, PiiPattern, RefusalTexts};

pub use domain::{
    ErrorCode, EvalScores, Faithfulness, PipelineResult, RagGuardError, Result, RetrievedChunk,
};

pub use evaluator::{CodeCount, EvaluationStats, Evaluator, StatsSnapshot};

pub use guardrails::{
    average_relevance, evaluate_confidence, wrap_context, ConfidenceVerdict, GuardrailFinding,
    InputCheck, InputGuardrails, InputVerdict, IntegrityViolation, OutputGuardrails,
    OutputVerdict,
};

pub use limits::{ExecutionLimiter, LimitError, LimitResult};

pub use orchestrator::{BatchEvent, BatchOrchestrator};

pub use pipeline::QueryPipeline;

pub use refusal::RefusalMapper;

pub use report::{
    format_result, read_results_artifact, render_record, render_report, write_report,
    write_results_artifact, ReportWriter, ResultsArtifact,
};

/// RagGuard version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
