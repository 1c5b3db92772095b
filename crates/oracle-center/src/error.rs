//! Center error type, mirroring `sentry-edge::error`'s shape.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("store error: {0}")]
    Store(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("reasoning client error: {0}")]
    Reasoning(String),

    #[error(transparent)]
    Core(#[from] sentry_core::CoreError),
}

pub type Result<T> = std::result::Result<T, OracleError>;
