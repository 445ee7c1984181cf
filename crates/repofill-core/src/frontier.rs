//! The traversal frontier.
//!
//! A deduplicating worklist of prefixes awaiting expansion, popped in name
//! order. A name popped once can never be queued again in the same
//! frontier, which stops overlapping answers from re-expanding a subtree.

use std::collections::{BTreeSet, HashSet};

use crate::name::Name;

/// Ordered, duplicate-free worklist of names.
#[derive(Debug, Default, Clone)]
pub struct Frontier {
    /// Names waiting to be expanded.
    pending: BTreeSet<Name>,
    /// Names already handed out by `pop_min`.
    popped: HashSet<Name>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every name, returning how many were new.
    pub fn seed(&mut self, names: impl IntoIterator<Item = Name>) -> usize {
        names
            .into_iter()
            .filter(|name| self.insert(name.clone()))
            .count()
    }

    /// Queue a name.
    ///
    /// Returns false if it is already pending or was popped before.
    pub fn insert(&mut self, name: Name) -> bool {
        if self.popped.contains(&name) {
            return false;
        }
        self.pending.insert(name)
    }

    /// Remove and return the smallest pending name.
    pub fn pop_min(&mut self) -> Option<Name> {
        let name = self.pending.pop_first()?;
        self.popped.insert(name.clone());
        Some(name)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of pending names.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.pending.contains(name)
    }

    /// Whether the name was already expanded.
    pub fn was_popped(&self, name: &Name) -> bool {
        self.popped.contains(name)
    }

    /// Iterate pending names in order.
    pub fn iter(&self) -> impl Iterator<Item = &Name> {
        self.pending.iter()
    }
}
