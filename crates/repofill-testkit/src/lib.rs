//! # Repofill Testkit
//!
//! Testing utilities for repofill.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Generators**: Proptest strategies for segments, names and versions
//! - **Fixtures**: Scripted networks and on-disk network/repository pairs
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use repofill_testkit::generators::name;
//!
//! proptest! {
//!     #[test]
//!     fn uri_round_trips(n in name(6)) {
//!         prop_assert_eq!(repofill_core::Name::parse(&n.to_uri()).unwrap(), n);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use repofill_testkit::fixtures::NetworkFixture;
//!
//! let fixture = NetworkFixture::with_sources(2);
//! fixture.publish("/videos/intro", 3, "frames");
//! fixture.store_local("/videos/intro", 2, "old frames");
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{name, DirFixture, NetworkFixture};
