//! Guardrails: deterministic checks that may short-circuit a query.
//!
//! All detectors here are heuristics driven by the rule tables in
//! [`GuardConfig`](crate::config::GuardConfig). They catch known phrasings;
//! they are not a guarantee against novel attacks.
//!
//! # Modules
//!
//! - [`input`]      — length, PII redaction, off-topic, injection, jailbreak
//! - [`context`]    — delimiter wrapping of retrieved passages
//! - [`confidence`] — retrieval confidence gate and relevance average
//! - [`output`]     — answer length and integrity checks

pub mod confidence;
pub mod context;
pub mod input;
pub mod output;

use serde::{Deserialize, Serialize};

use crate::domain::ErrorCode;

pub use confidence::{average_relevance, evaluate_confidence, ConfidenceVerdict};
pub use context::wrap_context;
pub use input::{InputCheck, InputGuardrails, InputVerdict};
pub use output::{IntegrityViolation, OutputGuardrails, OutputVerdict};

/// One guardrail hit: the code plus optional diagnostic detail.
///
/// `detail` carries what matched (pattern, keyword, redaction count), never
/// the full user text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailFinding {
    pub code: ErrorCode,
    pub detail: Option<String>,
}

impl GuardrailFinding {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }
}
