//! Error types for the live suite

use thiserror::Error;

use chatgauge_core::CoreError;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("playwright driver not available: {0}")]
    DriverUnavailable(String),

    #[error("driver protocol error: {0}")]
    Protocol(String),

    #[error("driver command '{cmd}' failed: {reason}")]
    Command { cmd: String, reason: String },

    #[error("driver stopped responding within {0:?}")]
    DriverTimeout(std::time::Duration),

    #[error("login failed: {0}")]
    Login(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
