//! Proptest generators for property-based testing.

use proptest::prelude::*;

use repofill_core::{Name, Segment, Version};

/// Generate segment text the name parser accepts and that is never a
/// version marker.
pub fn plain_segment_text() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9._-]{0,11}".prop_map(String::from)
}

/// Generate a plain segment.
pub fn plain_segment() -> impl Strategy<Value = Segment> {
    plain_segment_text().prop_map(Segment::from)
}

/// Generate a version.
pub fn version() -> impl Strategy<Value = Version> {
    any::<u64>().prop_map(Version)
}

/// Generate a version marker segment.
pub fn version_segment() -> impl Strategy<Value = Segment> {
    version().prop_map(|v| v.to_segment())
}

/// Generate a name of at most `max_depth` plain segments.
pub fn name(max_depth: usize) -> impl Strategy<Value = Name> {
    prop::collection::vec(plain_segment(), 0..=max_depth).prop_map(Name::from_segments)
}

/// Generate a non-root name.
pub fn non_root_name(max_depth: usize) -> impl Strategy<Value = Name> {
    prop::collection::vec(plain_segment(), 1..=max_depth.max(1)).prop_map(Name::from_segments)
}

/// Generate a set of published objects: parent name and version.
pub fn published(max_objects: usize) -> impl Strategy<Value = Vec<(Name, Version)>> {
    prop::collection::vec((non_root_name(4), 1u64..1000), 0..=max_objects)
        .prop_map(|items| items.into_iter().map(|(n, v)| (n, Version(v))).collect())
}
