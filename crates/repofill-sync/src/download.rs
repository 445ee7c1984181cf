//! The download decision set.

use std::collections::BTreeSet;

use repofill_core::Name;

/// Names judged missing or stale locally, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSet {
    names: BTreeSet<Name>,
}

impl DownloadSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the name was already selected.
    pub fn insert(&mut self, name: Name) -> bool {
        self.names.insert(name)
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Name> {
        self.names.iter()
    }
}

impl IntoIterator for DownloadSet {
    type Item = Name;
    type IntoIter = std::collections::btree_set::IntoIter<Name>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.into_iter()
    }
}

impl<'a> IntoIterator for &'a DownloadSet {
    type Item = &'a Name;
    type IntoIter = std::collections::btree_set::Iter<'a, Name>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter()
    }
}
