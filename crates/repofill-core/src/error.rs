//! Error types for repofill core.

use thiserror::Error;

/// Errors raised while parsing names and version markers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("malformed name {input:?}: {reason}")]
    MalformedName { input: String, reason: String },

    #[error("malformed version marker: {0}")]
    MalformedVersion(String),
}

impl CoreError {
    pub(crate) fn malformed_name(input: &str, reason: impl Into<String>) -> Self {
        CoreError::MalformedName {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
