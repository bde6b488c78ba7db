//! Answer scoring and run-level statistics.
//!
//! [`Evaluator`] scores faithfulness (optionally via a secondary model) and
//! relevance. [`EvaluationStats`] aggregates outcomes across a run; it is an
//! explicit value owned by the caller and mutated through `&mut`, so there is
//! exactly one writer. [`StatsSnapshot`] is the immutable view used for the
//! summary dashboard and the JSON artifact.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collaborators::Generator;
use crate::config::GuardConfig;
use crate::domain::{ErrorCode, Faithfulness, RetrievedChunk};
use crate::guardrails::average_relevance;
use crate::obs;
use crate::prompt::build_faithfulness_prompt;

/// Markers of a refusal-shaped answer, treated as faithful by construction.
const REFUSAL_MARKERS: [&str; 4] = [
    "sorry",
    "refuse",
    "authorized",
    "don't have enough information",
];

/// Contexts longer than this count as support in the heuristic fallback.
const HEURISTIC_MIN_CONTEXT_CHARS: usize = 100;

#[derive(Clone)]
pub struct Evaluator {
    model: Option<Arc<dyn Generator>>,
    config: Arc<GuardConfig>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("model", &self.model.is_some())
            .finish()
    }
}

impl Evaluator {
    /// Heuristic-only evaluator.
    pub fn new(config: Arc<GuardConfig>) -> Self {
        Self {
            model: None,
            config,
        }
    }

    /// Use `model` to judge faithfulness; failures fall back to the heuristic.
    pub fn with_model(mut self, model: Arc<dyn Generator>) -> Self {
        self.model = Some(model);
        self
    }

    /// Judge whether `answer` is supported by `context`.
    ///
    /// Refusals, "I don't know" answers and empty inputs are not scored.
    pub async fn faithfulness(&self, query: &str, answer: &str, context: &str) -> Faithfulness {
        if !is_scorable(answer, context) {
            return Faithfulness::NotApplicable;
        }

        let Some(model) = &self.model else {
            return heuristic_faithfulness(answer, context);
        };

        let prompt = build_faithfulness_prompt(&self.config, context, query, answer);
        let deadline = self.config.llm_timeout();

        match tokio::time::timeout(deadline, model.generate(&prompt, deadline)).await {
            Ok(Ok(verdict)) => Faithfulness::from_supported(parse_verdict(&verdict)),
            Ok(Err(err)) => {
                obs::emit_evaluation_degraded(&err);
                heuristic_faithfulness(answer, context)
            }
            Err(_elapsed) => {
                obs::emit_evaluation_degraded(&format!(
                    "evaluator exceeded {}s",
                    deadline.as_secs()
                ));
                heuristic_faithfulness(answer, context)
            }
        }
    }

    /// Mean effective retrieval score.
    pub fn relevance(&self, chunks: &[RetrievedChunk]) -> f64 {
        average_relevance(chunks)
    }

    pub fn deadline(&self) -> Duration {
        self.config.llm_timeout()
    }
}

fn is_scorable(answer: &str, context: &str) -> bool {
    if answer.trim().is_empty() || context.trim().is_empty() {
        return false;
    }
    let lower = answer.to_lowercase();
    !(lower.contains("sorry") || lower.contains("i don't know"))
}

/// Strict parse: the first word, stripped of punctuation, must be "yes".
pub fn parse_verdict(raw: &str) -> bool {
    raw.split_whitespace()
        .next()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .eq_ignore_ascii_case("yes")
        })
        .unwrap_or(false)
}

/// Length-proxy fallback used when no evaluator model answers.
pub fn heuristic_faithfulness(answer: &str, context: &str) -> Faithfulness {
    let lower = answer.to_lowercase();
    if REFUSAL_MARKERS.iter().any(|m| lower.contains(m)) {
        return Faithfulness::Faithful;
    }
    Faithfulness::from_supported(context.chars().count() > HEURISTIC_MIN_CONTEXT_CHARS)
}

/// Trigger count for one error code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCount {
    pub code: ErrorCode,
    pub count: usize,
}

/// Run-level aggregator.
#[derive(Debug, Clone, Default)]
pub struct EvaluationStats {
    total_queries: usize,
    code_counts: Vec<CodeCount>,
    faithfulness_scores: Vec<f64>,
    relevance_scores: Vec<f64>,
}

impl EvaluationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished invocation; `None` is a clean success.
    pub fn record_outcome(&mut self, code: Option<ErrorCode>) {
        self.total_queries += 1;
        let Some(code) = code else {
            return;
        };
        match self.code_counts.iter_mut().find(|c| c.code == code) {
            Some(entry) => entry.count += 1,
            None => self.code_counts.push(CodeCount { code, count: 1 }),
        }
    }

    /// Record a faithfulness verdict; unscored verdicts are ignored.
    pub fn record_faithfulness(&mut self, verdict: Faithfulness) {
        if let Some(score) = verdict.score() {
            self.faithfulness_scores.push(score);
        }
    }

    pub fn record_relevance(&mut self, relevance: f64) {
        self.relevance_scores.push(relevance);
    }

    pub fn total_queries(&self) -> usize {
        self.total_queries
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_queries: self.total_queries,
            guardrails_triggered: self.code_counts.clone(),
            faithfulness_scores: self.faithfulness_scores.clone(),
            relevance_scores: self.relevance_scores.clone(),
        }
    }
}

/// Immutable copy of [`EvaluationStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_queries: usize,
    /// Per-code counts in first-seen order.
    pub guardrails_triggered: Vec<CodeCount>,
    pub faithfulness_scores: Vec<f64>,
    pub relevance_scores: Vec<f64>,
}

impl StatsSnapshot {
    pub fn mean_faithfulness(&self) -> f64 {
        mean(&self.faithfulness_scores)
    }

    pub fn mean_relevance(&self) -> f64 {
        mean(&self.relevance_scores)
    }

    pub fn count_for(&self, code: ErrorCode) -> usize {
        self.guardrails_triggered
            .iter()
            .find(|c| c.code == code)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    /// Render the evaluation dashboard.
    pub fn render_summary(&self) -> String {
        let heavy = "=".repeat(50);
        let light = "-".repeat(50);

        let mut out = String::new();
        out.push('\n');
        out.push_str(&format!("{heavy}\n"));
        out.push_str("RAG SYSTEM EVALUATION SUMMARY\n");
        out.push_str(&format!("{heavy}\n"));
        out.push_str(&format!("Total Queries:         {}\n", self.total_queries));
        out.push_str(&format!(
            "Avg Faithfulness:      {:.2}\n",
            self.mean_faithfulness()
        ));
        out.push_str(&format!(
            "Avg Retrieval Score:   {:.2}\n",
            self.mean_relevance()
        ));
        out.push_str(&format!("{light}\n"));
        out.push_str("GUARDRAILS TRIGGERED:\n");
        for entry in &self.guardrails_triggered {
            out.push_str(&format!(" - {:20}: {}\n", entry.code.as_str(), entry.count));
        }
        out.push_str(&format!("{heavy}\n"));
        out
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
