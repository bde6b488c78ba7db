//! Domain models for RagGuard.
//!
//! Canonical definitions for the core entities:
//! - `ErrorCode`: closed guardrail/pipeline failure vocabulary
//! - `RetrievedChunk`: one ranked passage from the retriever
//! - `PipelineResult`: the per-query outcome returned to callers

pub mod chunk;
pub mod error;
pub mod result;

// Re-export main types and errors
pub use chunk::RetrievedChunk;
pub use error::{ErrorCode, RagGuardError, Result};
pub use result::{EvalScores, Faithfulness, PipelineResult};
