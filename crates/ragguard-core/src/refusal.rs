//! Error code to refusal text mapping.
//!
//! Refusals are static strings: user input is never interpolated, so an
//! attacker cannot get their own text echoed back through a refusal.

use crate::config::RefusalTexts;
use crate::domain::ErrorCode;

/// Total mapping from [`ErrorCode`] to a fixed refusal string.
#[derive(Debug, Clone)]
pub struct RefusalMapper {
    texts: RefusalTexts,
}

impl RefusalMapper {
    pub fn new(texts: RefusalTexts) -> Self {
        Self { texts }
    }

    /// Refusal for `code`; falls back to the generic text for blank entries.
    pub fn refusal(&self, code: ErrorCode) -> &str {
        let text = match code {
            ErrorCode::QueryTooLong => &self.texts.query_too_long,
            ErrorCode::OffTopic => &self.texts.off_topic,
            ErrorCode::PiiDetected => &self.texts.pii_detected,
            ErrorCode::RetrievalEmpty => &self.texts.retrieval_empty,
            ErrorCode::LlmTimeout => &self.texts.llm_timeout,
            ErrorCode::LlmError => &self.texts.llm_error,
            ErrorCode::PolicyBlock => &self.texts.policy_block,
            ErrorCode::RateLimit => &self.texts.rate_limit,
        };

        if text.trim().is_empty() {
            self.fallback()
        } else {
            text
        }
    }

    /// Refusal for a raw code string, e.g. one read back from a report.
    pub fn refusal_for_name(&self, code: &str) -> &str {
        match code.parse::<ErrorCode>() {
            Ok(code) => self.refusal(code),
            Err(_) => self.fallback(),
        }
    }

    pub fn fallback(&self) -> &str {
        &self.texts.fallback
    }
}

impl Default for RefusalMapper {
    fn default() -> Self {
        Self::new(RefusalTexts::default())
    }
}
