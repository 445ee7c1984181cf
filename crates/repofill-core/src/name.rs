//! Hierarchical names.
//!
//! A [`Name`] is an ordered sequence of opaque [`Segment`]s, written as a
//! slash-separated path with an optional `ccnx:` scheme. Names never mutate
//! after creation; extending a name produces a new one.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// URI scheme accepted in front of a name and emitted by [`Name::to_uri`].
pub const URI_SCHEME: &str = "ccnx:";

/// One component of a [`Name`].
///
/// Segments order shorter-first; segments of equal length compare bytewise.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment(Vec<u8>);

impl Segment {
    /// Create a segment from raw bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl AsRef<[u8]> for Segment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Anything the parser would reject, and `%` itself, is percent-escaped
        // so the text parses back to the same bytes.
        match std::str::from_utf8(&self.0) {
            Ok(text) => {
                let mut utf8 = [0u8; 4];
                for c in text.chars() {
                    if is_segment_char(c) && c != '%' {
                        write!(f, "{}", c)?;
                    } else {
                        for b in c.encode_utf8(&mut utf8).bytes() {
                            write!(f, "%{:02X}", b)?;
                        }
                    }
                }
            }
            Err(_) => {
                for &b in &self.0 {
                    if b.is_ascii_graphic() && b != b'/' && b != b'%' {
                        write!(f, "{}", b as char)?;
                    } else {
                        write!(f, "%{:02X}", b)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Segment({})", self)
    }
}

fn is_segment_char(c: char) -> bool {
    c != '/' && !c.is_whitespace() && !c.is_control()
}

/// Decode `%XX` escapes in one segment of name text.
fn unescape(raw: &str) -> std::result::Result<Vec<u8>, String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let escape = raw
            .get(i + 1..i + 3)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| format!("bad percent escape at byte {}", i))?;
        let value = u8::from_str_radix(escape, 16).map_err(|e| e.to_string())?;
        out.push(value);
        i += 3;
    }
    Ok(out)
}

/// An immutable hierarchical name.
///
/// Names compare segment by segment; a proper prefix sorts before any of
/// its extensions. Every ordered collection of names in repofill iterates
/// in this order.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name {
    segments: Vec<Segment>,
}

impl Name {
    /// The zero-segment root name.
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Build a name from segments.
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    /// Parse a name from its textual form.
    ///
    /// Accepts `ccnx:/a/b`, `/a/b`, the relative `a/b` (read from the root)
    /// and a single trailing slash. The empty text and `/` map to the root
    /// name. Segments are split on `/` and `%XX` escapes are decoded; empty
    /// interior segments, whitespace, control characters and broken escapes
    /// are rejected.
    pub fn parse(text: &str) -> Result<Self> {
        let path = text.strip_prefix(URI_SCHEME).unwrap_or(text);
        if path.is_empty() {
            return Ok(Self::root());
        }

        let body = path.strip_prefix('/').unwrap_or(path);
        let body = body.strip_suffix('/').unwrap_or(body);
        if body.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for raw in body.split('/') {
            if raw.is_empty() {
                return Err(CoreError::malformed_name(text, "empty segment"));
            }
            if let Some(bad) = raw.chars().find(|c| !is_segment_char(*c)) {
                return Err(CoreError::malformed_name(
                    text,
                    format!("invalid character {:?} in segment", bad),
                ));
            }
            let bytes = unescape(raw).map_err(|reason| CoreError::malformed_name(text, reason))?;
            segments.push(Segment::from_bytes(bytes));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment, if any.
    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// A new name with `segment` appended.
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment);
        Self { segments }
    }

    /// The name with its last segment removed, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    /// Check whether `self` is a prefix of (or equal to) `other`.
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Canonical textual form, including the URI scheme.
    pub fn to_uri(&self) -> String {
        format!("{}{}", URI_SCHEME, self)
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

impl FromStr for Name {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
