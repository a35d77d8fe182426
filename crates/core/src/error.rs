//! Error types for the answer-quality engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// The streaming answer never stabilized within the wait budget.
    /// Carries the last text observed so a failure can be triaged without
    /// re-running the case.
    #[error("timed out waiting for a settled answer; last seen:\n{last_seen}")]
    Timeout { last_seen: String },

    /// The embedding model could not be brought up. Fatal for the whole
    /// run, never handled per case.
    #[error("embedding model setup failed for '{model}': {reason}")]
    ModelSetup { model: String, reason: String },

    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// A single read of the live answer region failed. The waiter treats
    /// this as transient and retries on the next poll tick.
    #[error("answer region read failed: {0}")]
    RegionRead(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether the waiter may swallow this error and poll again.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::RegionRead(_))
    }
}
