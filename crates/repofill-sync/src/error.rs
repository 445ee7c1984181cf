//! Error types for the engine.

use repofill_net::NetError;
use thiserror::Error;

/// Errors that isolate to a single prefix or name.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A discovery round could not begin.
    #[error("enumeration of {prefix} failed: {source}")]
    Registration {
        prefix: String,
        #[source]
        source: NetError,
    },

    /// Reading or storing a name's content failed.
    #[error("transfer of {name} failed: {source}")]
    Transfer {
        name: String,
        #[source]
        source: NetError,
    },
}

impl SyncError {
    pub(crate) fn transfer(name: &repofill_core::Name, source: NetError) -> Self {
        SyncError::Transfer {
            name: name.to_uri(),
            source,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;
