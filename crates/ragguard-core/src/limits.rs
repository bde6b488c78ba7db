//! Deadline-bounded execution of a single operation.
//!
//! The operation runs on its own tokio task and the caller joins it with a
//! timeout. On expiry the task is aborted at its next await point and its
//! output, if any, is discarded; the caller never waits past the deadline.

use std::future::Future;
use std::time::Duration;

use crate::obs;

/// Errors produced by the execution limiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitError {
    #[error("operation timed out (limit {limit_ms}ms)")]
    Timeout { limit_ms: u64 },

    #[error("operation aborted: {detail}")]
    Aborted { detail: String },
}

pub type LimitResult<T> = std::result::Result<T, LimitError>;

#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimiter {
    limit: Duration,
}

impl ExecutionLimiter {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Run `operation` to completion or until the deadline elapses.
    ///
    /// A panic inside the operation surfaces as [`LimitError::Aborted`].
    pub async fn run<F, T>(&self, operation: F) -> LimitResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut handle = tokio::spawn(operation);

        match tokio::time::timeout(self.limit, &mut handle).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join_err)) => Err(LimitError::Aborted {
                detail: join_err.to_string(),
            }),
            Err(_elapsed) => {
                handle.abort();
                obs::emit_generation_timeout(self.limit);
                Err(LimitError::Timeout {
                    limit_ms: self.limit.as_millis() as u64,
                })
            }
        }
    }
}
