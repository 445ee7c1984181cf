//! The error collector.

use serde::{Deserialize, Serialize};

use repofill_core::Name;

/// Append-only list of inputs and names that failed at any stage.
///
/// Never deduplicated: a name appearing twice failed twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorList(Vec<String>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw input token (used when it does not parse).
    pub fn push(&mut self, entry: impl Into<String>) {
        self.0.push(entry.into());
    }

    /// Record a name by its canonical textual form.
    pub fn push_name(&mut self, name: &Name) {
        self.0.push(name.to_uri());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl Extend<String> for ErrorList {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}
