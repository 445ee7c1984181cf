//! Error types for the network boundary.

use thiserror::Error;

/// Errors raised by content network backends.
#[derive(Debug, Error)]
pub enum NetError {
    /// The session could not be opened.
    #[error("connection error: {0}")]
    Connection(String),

    /// A discovery round could not begin.
    #[error("registration failed for {prefix}: {reason}")]
    Registration { prefix: String, reason: String },

    /// A name could not be resolved to readable content.
    #[error("cannot resolve {name}: {reason}")]
    Resolution { name: String, reason: String },

    /// The local repository refused a write.
    #[error("store error for {name}: {reason}")]
    Store { name: String, reason: String },

    /// I/O error while streaming bytes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session was already closed.
    #[error("session closed")]
    Closed,
}

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;
