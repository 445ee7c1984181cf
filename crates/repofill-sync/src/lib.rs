//! # Repofill Sync
//!
//! The enumeration and reconciliation engine: walks a name tree through
//! asynchronous "children of this prefix" answers, decides which versioned
//! objects are missing or stale locally, then moves their bytes.
//!
//! ## Overview
//!
//! - [`EnumerationSession`] runs one round for one prefix: register
//!   interest, wait until enough sources answered or the deadline passed,
//!   unregister.
//! - [`reconcile_local`] walks the local repository and builds a
//!   [`LocalVersionRecord`] of what is already stored.
//! - [`Discovery`] drains a [`Frontier`](repofill_core::Frontier) one round
//!   at a time and fills a [`DownloadSet`].
//! - [`TransferPipeline`] streams each selected name and optionally
//!   persists it.
//! - [`ErrorList`] collects every name that failed at any stage.
//!
//! ## Round Flow
//!
//! ```text
//! Driver                     Session                  Sources
//!   |-- register_interest ---->|                          |
//!   |   (wait, deadline)       |<------- children --------|  listener: classify,
//!   |                          |<------- children --------|  count, notify
//!   |<- quorum met / timeout --|                          |
//!   |-- cancel_interest ------>|                          |
//! ```
//!
//! ## Failure Isolation
//!
//! A failed registration abandons that prefix's subtree. A failed transfer
//! abandons that name. Both are recorded and the run continues.

pub mod discovery;
pub mod download;
pub mod error;
pub mod failures;
pub mod reconcile;
pub mod session;
pub mod transfer;

pub use discovery::{Discovery, DiscoveryStats};
pub use download::DownloadSet;
pub use error::{Result, SyncError};
pub use failures::ErrorList;
pub use reconcile::{reconcile_local, LocalEntry, LocalReconciliation, LocalVersionRecord};
pub use session::{AnswerState, EnumerationSession, RoundConfig, RoundOutcome};
pub use transfer::{TransferPipeline, TransferReport, TransferTarget, DEFAULT_CHUNK_SIZE};
