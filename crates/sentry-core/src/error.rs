use thiserror::Error;

/// Shared error type for components common to both tiers (wire model
/// validation, alert construction). Each binary crate layers its own
/// component-specific error enum on top of this one.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid severity value: {0}")]
    InvalidSeverity(String),

    #[error("invalid alert type: {0}")]
    InvalidAlertType(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
