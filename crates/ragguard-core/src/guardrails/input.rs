//! Input guardrails over the raw query string.
//!
//! Checks run in the fixed order of [`InputCheck::PRIORITY`] and all of them
//! run, so every finding is reported. The first *blocking* finding decides
//! the refusal; PII findings only sanitize.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::GuardrailFinding;
use crate::config::GuardConfig;
use crate::domain::{ErrorCode, RagGuardError, Result};
use crate::obs;

/// Input checks in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputCheck {
    Length,
    Pii,
    OffTopic,
    Injection,
    Jailbreak,
}

impl InputCheck {
    /// Evaluation order; also the order findings are reported in, which makes
    /// the surfaced code deterministic.
    pub const PRIORITY: [InputCheck; 5] = [
        InputCheck::Length,
        InputCheck::Pii,
        InputCheck::OffTopic,
        InputCheck::Injection,
        InputCheck::Jailbreak,
    ];
}

/// Result of running every input check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputVerdict {
    /// Query with PII replaced by the redaction token.
    pub sanitized: String,
    /// Findings in [`InputCheck::PRIORITY`] order.
    pub findings: Vec<GuardrailFinding>,
}

impl InputVerdict {
    pub fn codes(&self) -> Vec<ErrorCode> {
        self.findings.iter().map(|f| f.code).collect()
    }

    /// Code of the first finding that refuses the query, if any.
    pub fn blocking_code(&self) -> Option<ErrorCode> {
        self.findings
            .iter()
            .map(|f| f.code)
            .find(|c| c.is_blocking())
    }

    pub fn pii_redacted(&self) -> bool {
        self.findings.iter().any(|f| f.code == ErrorCode::PiiDetected)
    }

    pub fn passed(&self) -> bool {
        self.blocking_code().is_none()
    }
}

#[derive(Debug, Clone)]
struct CompiledPii {
    category: String,
    regex: Regex,
}

/// Compiled input rule tables.
#[derive(Debug, Clone)]
pub struct InputGuardrails {
    max_query_length: usize,
    pii: Vec<CompiledPii>,
    redaction_token: String,
    off_topic_keywords: Vec<String>,
    injection_patterns: Vec<Regex>,
    jailbreak_keywords: Vec<String>,
}

impl InputGuardrails {
    pub fn from_config(config: &GuardConfig) -> Result<Self> {
        let pii = config
            .pii_patterns
            .iter()
            .map(|p| {
                Ok(CompiledPii {
                    category: p.category.clone(),
                    regex: compile(&p.pattern)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let injection_patterns = config
            .injection_patterns
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            max_query_length: config.max_query_length,
            pii,
            redaction_token: config.redaction_token.clone(),
            off_topic_keywords: lowercase_all(&config.off_topic_keywords),
            injection_patterns,
            jailbreak_keywords: lowercase_all(&config.jailbreak_keywords),
        })
    }

    /// Run every check and collect findings.
    pub fn check(&self, query: &str) -> InputVerdict {
        let mut sanitized = query.to_string();
        let mut findings = Vec::new();

        for check in InputCheck::PRIORITY {
            let finding = match check {
                InputCheck::Length => self.check_length(query),
                InputCheck::Pii => {
                    let (clean, redactions) = self.sanitize_pii(&sanitized);
                    sanitized = clean;
                    (redactions > 0).then(|| {
                        GuardrailFinding::with_detail(
                            ErrorCode::PiiDetected,
                            format!("{redactions} redaction(s)"),
                        )
                    })
                }
                InputCheck::OffTopic => self.is_off_topic(&sanitized).then(|| {
                    let prefix: String = sanitized.chars().take(50).collect();
                    GuardrailFinding::with_detail(ErrorCode::OffTopic, format!("query: {prefix}..."))
                }),
                InputCheck::Injection => self.injection_match(&sanitized).map(|pattern| {
                    GuardrailFinding::with_detail(
                        ErrorCode::PolicyBlock,
                        format!("injection pattern: {pattern}"),
                    )
                }),
                InputCheck::Jailbreak => self.jailbreak_match(&sanitized).map(|keyword| {
                    GuardrailFinding::with_detail(
                        ErrorCode::PolicyBlock,
                        format!("jailbreak keyword: {keyword}"),
                    )
                }),
            };

            if let Some(finding) = finding {
                obs::emit_guardrail_triggered(finding.code, finding.detail.as_deref());
                findings.push(finding);
            }
        }

        InputVerdict {
            sanitized,
            findings,
        }
    }

    fn check_length(&self, query: &str) -> Option<GuardrailFinding> {
        let length = query.chars().count();
        (length > self.max_query_length).then(|| {
            GuardrailFinding::with_detail(
                ErrorCode::QueryTooLong,
                format!("length {length} > {}", self.max_query_length),
            )
        })
    }

    /// Whether `query` is within the configured character limit.
    pub fn validate_length(&self, query: &str) -> bool {
        self.check_length(query).is_none()
    }

    /// Replace every PII match with the redaction token.
    ///
    /// Returns the sanitized text and the number of replacements made.
    pub fn sanitize_pii(&self, query: &str) -> (String, usize) {
        let mut clean = query.to_string();
        let mut redactions = 0;

        for pii in &self.pii {
            let matches = pii.regex.find_iter(&clean).count();
            if matches == 0 {
                continue;
            }
            tracing::debug!(category = %pii.category, matches, "redacting PII");
            clean = pii
                .regex
                .replace_all(&clean, regex::NoExpand(&self.redaction_token))
                .into_owned();
            redactions += matches;
        }

        (clean, redactions)
    }

    /// Allow-list check: off-topic unless some keyword occurs as a
    /// case-insensitive substring.
    ///
    /// Any text that mentions a keyword passes, even if the rest of the
    /// request is unrelated.
    pub fn is_off_topic(&self, query: &str) -> bool {
        let lower = query.to_lowercase();
        !self
            .off_topic_keywords
            .iter()
            .any(|k| !k.is_empty() && lower.contains(k.as_str()))
    }

    /// First injection regex matching the lower-cased query.
    pub fn injection_match(&self, query: &str) -> Option<&str> {
        let lower = query.to_lowercase();
        self.injection_patterns
            .iter()
            .find(|re| re.is_match(&lower))
            .map(|re| re.as_str())
    }

    /// First jailbreak keyword found in the lower-cased query.
    pub fn jailbreak_match(&self, query: &str) -> Option<&str> {
        let lower = query.to_lowercase();
        self.jailbreak_keywords
            .iter()
            .find(|k| !k.is_empty() && lower.contains(k.as_str()))
            .map(String::as_str)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| RagGuardError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}
