//! The per-query result returned to every caller.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ErrorCode;

/// Faithfulness verdict for one answer.
///
/// Serializes as `1.0`, `0.0`, `"N/A"` or `"skipped"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FaithfulnessRepr", into = "FaithfulnessRepr")]
pub enum Faithfulness {
    /// Answer fully supported by the retrieved context.
    Faithful,
    /// Answer contains claims the context does not support.
    Unfaithful,
    /// Answer is a refusal or "I don't know"; not scored.
    NotApplicable,
    /// Scoring was switched off for this query.
    Skipped,
}

impl Faithfulness {
    pub fn from_supported(supported: bool) -> Self {
        if supported {
            Faithfulness::Faithful
        } else {
            Faithfulness::Unfaithful
        }
    }

    /// Numeric score, if this verdict was actually scored.
    pub fn score(self) -> Option<f64> {
        match self {
            Faithfulness::Faithful => Some(1.0),
            Faithfulness::Unfaithful => Some(0.0),
            Faithfulness::NotApplicable | Faithfulness::Skipped => None,
        }
    }
}

impl fmt::Display for Faithfulness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Faithfulness::Faithful => f.write_str("1.0"),
            Faithfulness::Unfaithful => f.write_str("0.0"),
            Faithfulness::NotApplicable => f.write_str("N/A"),
            Faithfulness::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FaithfulnessRepr {
    Score(f64),
    Label(String),
}

impl From<Faithfulness> for FaithfulnessRepr {
    fn from(value: Faithfulness) -> Self {
        match value {
            Faithfulness::Faithful => FaithfulnessRepr::Score(1.0),
            Faithfulness::Unfaithful => FaithfulnessRepr::Score(0.0),
            Faithfulness::NotApplicable => FaithfulnessRepr::Label("N/A".to_string()),
            Faithfulness::Skipped => FaithfulnessRepr::Label("skipped".to_string()),
        }
    }
}

impl TryFrom<FaithfulnessRepr> for Faithfulness {
    type Error = String;

    fn try_from(value: FaithfulnessRepr) -> std::result::Result<Self, Self::Error> {
        match value {
            FaithfulnessRepr::Score(s) if s == 1.0 => Ok(Faithfulness::Faithful),
            FaithfulnessRepr::Score(s) if s == 0.0 => Ok(Faithfulness::Unfaithful),
            FaithfulnessRepr::Score(s) => Err(format!("faithfulness score must be 0.0 or 1.0, got {s}")),
            FaithfulnessRepr::Label(l) if l == "N/A" => Ok(Faithfulness::NotApplicable),
            FaithfulnessRepr::Label(l) if l == "skipped" => Ok(Faithfulness::Skipped),
            FaithfulnessRepr::Label(l) => Err(format!("unknown faithfulness label: {l}")),
        }
    }
}

/// Evaluation scores attached to every result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalScores {
    pub faithfulness: Faithfulness,
    /// Mean retrieval score (0.0 when nothing was retrieved).
    pub relevance: f64,
}

impl EvalScores {
    pub fn unscored(relevance: f64) -> Self {
        Self {
            faithfulness: Faithfulness::NotApplicable,
            relevance,
        }
    }
}

/// Outcome of one pipeline invocation.
///
/// Built once at the terminal state and handed to the caller; nothing in
/// the pipeline touches it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// The query exactly as submitted.
    pub query: String,
    /// Generated answer, refusal text or generic error marker.
    pub answer: String,
    /// Every guardrail code raised, in check order.
    pub guardrails_triggered: Vec<ErrorCode>,
    /// Terminal code; `None` serializes as `"none"`.
    #[serde(with = "error_code_or_none")]
    pub error_code: Option<ErrorCode>,
    /// Retrieved chunk contents, rank order.
    pub chunks: Vec<String>,
    /// `"source (Page n)"` strings for a released answer.
    pub citations: BTreeSet<String>,
    pub eval: EvalScores,
}

impl PipelineResult {
    /// Whether the query completed without a terminal code.
    pub fn is_clean(&self) -> bool {
        self.error_code.is_none()
    }
}

mod error_code_or_none {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::domain::error::ErrorCode;

    const NONE: &str = "none";

    pub fn serialize<S: Serializer>(value: &Option<ErrorCode>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(code) => code.serialize(s),
            None => s.serialize_str(NONE),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ErrorCode>, D::Error> {
        let raw = String::deserialize(d)?;
        if raw == NONE {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(serde::de::Error::custom)
    }
}
