use std::time::Duration;

use thiserror::Error;

/// Failures of the backing score store. Both variants are transient: the
/// caller may retry, and every write the store accepts is idempotent.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation {operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("store unavailable: {0:#}")]
    Unavailable(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ScoreboardError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScoreboardError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

pub type Result<T, E = ScoreboardError> = std::result::Result<T, E>;
