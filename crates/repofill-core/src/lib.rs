//! # Repofill Core
//!
//! Pure primitives for repofill: hierarchical names, version markers and the
//! traversal frontier.
//!
//! This crate contains no I/O and no networking. It is pure computation over
//! names.
//!
//! ## Key Types
//!
//! - [`Name`] - An immutable, totally ordered sequence of opaque segments
//! - [`Segment`] - One component of a name
//! - [`Version`] - The decoded value of a version marker segment
//! - [`SegmentKind`] - Classification of a child segment (versioned, other marker, or plain)
//! - [`Frontier`] - Deduplicating worklist of prefixes awaiting expansion
//!
//! ## Textual Form
//!
//! Names are written as `ccnx:/a/b/c` or `/a/b/c`. The root name is `/`.
//! Text without a leading `/` is read from the root.
//! Version markers are segments of the form `=FD<hex>`.

pub mod error;
pub mod frontier;
pub mod name;
pub mod version;

pub use error::{CoreError, Result};
pub use frontier::Frontier;
pub use name::{Name, Segment, URI_SCHEME};
pub use version::{
    classify, compare_versions, decode_version, is_version_marker, SegmentKind, Version,
    MARKER_LEAD, VERSION_MARKER_PREFIX,
};
