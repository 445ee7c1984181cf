//! Error types for a populate run.

use repofill_net::NetError;
use thiserror::Error;

/// Errors that abort a whole run.
///
/// Per-name failures never surface here; they land in the run's
/// [`ErrorList`](repofill_sync::ErrorList).
#[derive(Debug, Error)]
pub enum PopulateError {
    /// The network session could not be opened. Nothing was processed.
    #[error("cannot connect to the content network: {0}")]
    Connection(#[source] NetError),
}

/// Result type for populate runs.
pub type Result<T> = std::result::Result<T, PopulateError>;
