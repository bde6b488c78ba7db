//! Output guardrails over the generated answer.
//!
//! Two independent checks; an answer is released only if both pass and any
//! failure maps to `POLICY_BLOCK`.

use serde::{Deserialize, Serialize};

use super::GuardrailFinding;
use crate::config::GuardConfig;
use crate::domain::ErrorCode;
use crate::obs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputVerdict {
    pub findings: Vec<GuardrailFinding>,
}

impl OutputVerdict {
    pub fn passed(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.findings.first().map(|f| f.code)
    }
}

/// Why an answer failed the integrity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// At least `leak_threshold` system-prompt phrases surfaced.
    PromptLeak { matched: usize },
    /// A persona-takeover phrase appeared with no domain phrase alongside.
    PersonaTakeover { phrase: String },
}

#[derive(Debug, Clone)]
pub struct OutputGuardrails {
    max_response_words: usize,
    leak_phrases: Vec<String>,
    leak_threshold: usize,
    success_phrases: Vec<String>,
    core_phrases: Vec<String>,
}

impl OutputGuardrails {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            max_response_words: config.max_response_words,
            leak_phrases: lowercase_all(&config.system_leak_phrases),
            leak_threshold: config.leak_threshold,
            success_phrases: lowercase_all(&config.injection_success_phrases),
            core_phrases: lowercase_all(&config.domain_core_phrases),
        }
    }

    pub fn check(&self, answer: &str) -> OutputVerdict {
        let mut findings = Vec::new();

        if !self.validate_length(answer) {
            findings.push(GuardrailFinding::with_detail(
                ErrorCode::PolicyBlock,
                format!(
                    "answer has {} words > {}",
                    answer.split_whitespace().count(),
                    self.max_response_words
                ),
            ));
        }

        if let Some(violation) = self.integrity_violation(answer) {
            let detail = match violation {
                IntegrityViolation::PromptLeak { matched } => {
                    format!("system prompt leak ({matched} phrases)")
                }
                IntegrityViolation::PersonaTakeover { phrase } => {
                    format!("injection success phrase: {phrase}")
                }
            };
            findings.push(GuardrailFinding::with_detail(ErrorCode::PolicyBlock, detail));
        }

        for finding in &findings {
            obs::emit_guardrail_triggered(finding.code, finding.detail.as_deref());
        }

        OutputVerdict { findings }
    }

    /// Whether the answer is within the word limit.
    pub fn validate_length(&self, answer: &str) -> bool {
        answer.split_whitespace().count() <= self.max_response_words
    }

    pub fn integrity_violation(&self, answer: &str) -> Option<IntegrityViolation> {
        let lower = answer.to_lowercase();

        let matched = self
            .leak_phrases
            .iter()
            .filter(|p| !p.is_empty() && lower.contains(p.as_str()))
            .count();
        if matched >= self.leak_threshold {
            return Some(IntegrityViolation::PromptLeak { matched });
        }

        let on_domain = self
            .core_phrases
            .iter()
            .any(|p| !p.is_empty() && lower.contains(p.as_str()));
        if on_domain {
            return None;
        }

        self.success_phrases
            .iter()
            .find(|p| !p.is_empty() && lower.contains(p.as_str()))
            .map(|phrase| IntegrityViolation::PersonaTakeover {
                phrase: phrase.clone(),
            })
    }
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}
