//! Retrieved passages as handed over by the external retriever.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One retrieved passage with optional relevance score and provenance.
///
/// A sequence of chunks is always in rank order (best first). Chunks only
/// live for the duration of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Passage text.
    pub content: String,
    /// Relevance score in `[0.0, 1.0]`, when the retriever surfaces one.
    #[serde(default)]
    pub score: Option<f64>,
    /// Source identifier (usually a file path or document name).
    #[serde(default = "unknown_source")]
    pub source: String,
    /// Zero-indexed page number within the source.
    #[serde(default)]
    pub page: Option<u32>,
}

fn unknown_source() -> String {
    "Unknown".to_string()
}

impl RetrievedChunk {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            score: None,
            source: source.into(),
            page: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Score used for gating and relevance: missing scores count as `1.0`.
    pub fn effective_score(&self) -> f64 {
        self.score.unwrap_or(1.0)
    }

    /// `"<file name> (Page n)"` with a one-indexed page, or just the file name.
    pub fn citation(&self) -> String {
        let name = if self.source == "Unknown" {
            self.source.clone()
        } else {
            Path::new(&self.source)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.source.clone())
        };

        match self.page {
            Some(page) => format!("{} (Page {})", name, page + 1),
            None => name,
        }
    }
}
