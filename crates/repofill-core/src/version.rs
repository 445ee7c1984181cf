//! Version marker segments.
//!
//! A version marker is a child segment made of the reserved prefix `=FD`
//! followed by a base-16 unsigned value. A higher value is a strictly newer
//! version. Markers are decoded once, at classification time, into a
//! [`SegmentKind`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{CoreError, Result};
use crate::name::Segment;

/// Reserved prefix that tags a segment as a version marker.
pub const VERSION_MARKER_PREFIX: &[u8] = b"=FD";

/// Leading byte shared by every marker segment (versions, segment numbers
/// and the like). Marker children are leaves, never prefixes.
pub const MARKER_LEAD: u8 = b'=';

/// The decoded value of a version marker.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(pub u64);

impl Version {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Encode as a marker segment (`=FD` + uppercase big-endian hex, no
    /// leading zero bytes).
    pub fn to_segment(&self) -> Segment {
        let bytes = self.0.to_be_bytes();
        let first = bytes
            .iter()
            .position(|&b| b != 0)
            .unwrap_or(bytes.len() - 1);
        let mut out = VERSION_MARKER_PREFIX.to_vec();
        out.extend_from_slice(hex::encode_upper(&bytes[first..]).as_bytes());
        Segment::from_bytes(out)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({:#x})", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// Classification of a child segment observed during enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// A version marker: the parent owns content at this version.
    Versioned(Version),
    /// Some other marker segment: a leaf that is neither a version nor a
    /// prefix.
    Marker,
    /// An ordinary segment: the child is a prefix to expand further.
    Plain,
}

/// Check whether a segment carries the reserved version prefix.
pub fn is_version_marker(segment: &Segment) -> bool {
    segment.as_bytes().starts_with(VERSION_MARKER_PREFIX)
}

/// Decode a version marker segment.
///
/// Fails with [`CoreError::MalformedVersion`] if the reserved prefix is
/// missing or the remainder is not a non-empty base-16 value fitting in 64
/// bits.
pub fn decode_version(segment: &Segment) -> Result<Version> {
    let digits = segment
        .as_bytes()
        .strip_prefix(VERSION_MARKER_PREFIX)
        .ok_or_else(|| CoreError::MalformedVersion(format!("{} lacks the =FD prefix", segment)))?;

    if digits.is_empty() || !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(CoreError::MalformedVersion(format!(
            "{} has a non-hex value",
            segment
        )));
    }

    let text = std::str::from_utf8(digits)
        .map_err(|e| CoreError::MalformedVersion(e.to_string()))?;
    u64::from_str_radix(text, 16)
        .map(Version)
        .map_err(|_| CoreError::MalformedVersion(format!("{} overflows 64 bits", segment)))
}

/// Compare two version marker segments by decoded value.
pub fn compare_versions(a: &Segment, b: &Segment) -> Result<Ordering> {
    Ok(decode_version(a)?.cmp(&decode_version(b)?))
}

/// Classify a child segment.
///
/// Returns an error only for segments that carry the reserved version
/// prefix but do not decode.
pub fn classify(segment: &Segment) -> Result<SegmentKind> {
    if is_version_marker(segment) {
        decode_version(segment).map(SegmentKind::Versioned)
    } else if segment.as_bytes().first() == Some(&MARKER_LEAD) {
        Ok(SegmentKind::Marker)
    } else {
        Ok(SegmentKind::Plain)
    }
}
