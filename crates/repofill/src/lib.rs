//! # Repofill
//!
//! Populate a local content repository from a name-addressed network.
//!
//! ## Overview
//!
//! Repofill takes a set of names. It either fetches each one as given, or
//! walks the namespace below each one and fetches every versioned object it
//! finds:
//!
//! - **Enumeration**: every prefix is asked for its children; answers come
//!   back asynchronously from one or more sources.
//! - **Version selection**: a child carrying a version marker marks its
//!   prefix as a downloadable object; the newest version wins.
//! - **Verification**: with verify on, the local repository is walked first
//!   and anything already stored at the same or a newer version is skipped.
//! - **Transfer**: selected names are streamed and persisted, or only pulled
//!   through the network to fill its caches.
//!
//! Failures are isolated to the name involved and collected in the run's
//! [`PopulateReport`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use repofill::{Driver, PopulateConfig};
//! use repofill::net::DirNetwork;
//!
//! async fn example() {
//!     let network = DirNetwork::new("network", "repo");
//!     let config = PopulateConfig::new().with_enumerate(true).with_verify(true);
//!
//!     let driver = Driver::new(network, config);
//!     let report = driver.run(["/videos"]).await.unwrap();
//!     for failed in report.failures.iter() {
//!         println!("{}", failed);
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `repofill::core` - Names, version markers and the frontier
//! - `repofill::net` - The network boundary and its backends
//! - `repofill::sync` - Enumeration rounds, reconciliation and transfer

pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod report;

// Re-export component crates
pub use repofill_core as core;
pub use repofill_net as net;
pub use repofill_sync as sync;

pub use config::{PopulateConfig, DEFAULT_ROUND_TIMEOUT};
pub use driver::Driver;
pub use error::{PopulateError, Result};
pub use report::{Phase, PopulateReport};

pub use repofill_core::Name;
pub use repofill_net::{Addressing, ContentNetwork};
pub use repofill_sync::{ErrorList, TransferTarget};
