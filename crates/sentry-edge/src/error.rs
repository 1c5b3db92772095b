//! Edge error type. Task-boundary errors are reported with `anyhow`;
//! this enum covers errors that a caller might want to match on.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentryError {
    #[error("detector error: {0}")]
    Detector(String),

    #[error("log parse error: {0}")]
    LogParse(String),

    #[error("escalation delivery failed: {0}")]
    Escalation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] sentry_core::CoreError),
}

pub type Result<T> = std::result::Result<T, SentryError>;
