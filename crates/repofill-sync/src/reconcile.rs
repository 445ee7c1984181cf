//! Local reconciliation.
//!
//! Before a network-wide discovery, the local repository is walked with
//! the same round machinery (local scope, quorum 1) to learn which names are
//! already stored and at which version. The resulting
//! [`LocalVersionRecord`] is read-only for the rest of the pass and filters
//! the version markers found remotely.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use repofill_core::{Frontier, Name, Version};
use repofill_net::{Addressing, Session};

use crate::failures::ErrorList;
use crate::session::{EnumerationSession, RoundConfig};

/// What the local repository holds for one parent name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalEntry {
    /// Content is present; its version is not tracked.
    Present,
    /// Newest version stored locally.
    Version(Version),
}

/// Best locally stored version per parent name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalVersionRecord {
    entries: BTreeMap<Name, LocalEntry>,
}

impl LocalVersionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a version found locally under `parent`.
    ///
    /// With unversioned addressing only presence is kept. Otherwise the
    /// record only moves to a strictly greater version.
    pub fn observe(&mut self, parent: Name, version: Version, addressing: Addressing) {
        let seen = match addressing {
            Addressing::Unversioned => LocalEntry::Present,
            Addressing::Versioned => LocalEntry::Version(version),
        };
        self.entries
            .entry(parent)
            .and_modify(|entry| match (*entry, seen) {
                (LocalEntry::Version(old), LocalEntry::Version(new)) if new > old => *entry = seen,
                (LocalEntry::Present, LocalEntry::Version(_)) => *entry = seen,
                _ => {}
            })
            .or_insert(seen);
    }

    pub fn get(&self, parent: &Name) -> Option<LocalEntry> {
        self.entries.get(parent).copied()
    }

    pub fn contains(&self, parent: &Name) -> bool {
        self.entries.contains_key(parent)
    }

    /// Whether a remote `version` under `parent` should be transferred:
    /// nothing is stored locally, or the remote is strictly newer.
    pub fn admits(&self, parent: &Name, version: Version) -> bool {
        match self.entries.get(parent) {
            None => true,
            Some(LocalEntry::Version(local)) => version > *local,
            Some(LocalEntry::Present) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, LocalEntry)> {
        self.entries.iter().map(|(name, entry)| (name, *entry))
    }
}

/// Result of a local reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct LocalReconciliation {
    pub record: Arc<LocalVersionRecord>,
    /// Rounds run against the local repository.
    pub rounds: usize,
}

/// Walk the local repository below every seed, one prefix at a time.
///
/// Non-versioned local children are expanded too, so the whole local
/// subtree ends up in the record. Prefixes whose round cannot start are
/// recorded in `errors`.
pub async fn reconcile_local<S: Session + ?Sized>(
    session: &S,
    seeds: impl IntoIterator<Item = Name>,
    timeout: Duration,
    addressing: Addressing,
    errors: &mut ErrorList,
) -> LocalReconciliation {
    tracing::debug!("starting local verification");

    let mut frontier = Frontier::new();
    frontier.seed(seeds);
    let mut record = LocalVersionRecord::new();
    let mut rounds = 0;

    while let Some(prefix) = frontier.pop_min() {
        let round = EnumerationSession::new(prefix.clone(), RoundConfig::local(timeout), None);
        match round.run(session).await {
            Ok(outcome) => {
                rounds += 1;
                if let Some(version) = outcome.version {
                    record.observe(prefix, version, addressing);
                }
                for child in outcome.children {
                    frontier.insert(child);
                }
            }
            Err(e) => {
                tracing::warn!("error with local prefix: {}", e);
                errors.push_name(&prefix);
            }
        }
    }

    tracing::debug!(entries = record.len(), rounds, "ending local verification");

    LocalReconciliation {
        record: Arc::new(record),
        rounds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use repofill_net::{ContentNetwork, MemoryNetwork};

    const SHORT: Duration = Duration::from_millis(100);

    fn name(s: &str) -> Name {
        Name::parse(s).unwrap()
    }

    #[test]
    fn test_equal_or_older_remote_is_excluded() {
        let p = name("/p");
        let mut record = LocalVersionRecord::new();
        record.observe(p.clone(), Version(5), Addressing::Versioned);

        assert!(!record.admits(&p, Version(5)));
        assert!(!record.admits(&p, Version(3)));
        assert!(record.admits(&p, Version(9)));
        assert!(record.admits(&name("/q"), Version(1)));
    }

    #[test]
    fn test_record_keeps_maximum() {
        let p = name("/p");
        let mut record = LocalVersionRecord::new();
        record.observe(p.clone(), Version(2), Addressing::Versioned);
        record.observe(p.clone(), Version(8), Addressing::Versioned);
        record.observe(p.clone(), Version(4), Addressing::Versioned);

        assert_eq!(record.get(&p), Some(LocalEntry::Version(Version(8))));
    }

    #[test]
    fn test_unversioned_records_presence() {
        let p = name("/p");
        let mut record = LocalVersionRecord::new();
        record.observe(p.clone(), Version(2), Addressing::Unversioned);

        assert_eq!(record.get(&p), Some(LocalEntry::Present));
        assert!(!record.admits(&p, Version(100)));
    }

    #[tokio::test]
    async fn test_walks_local_subtree() {
        let network = MemoryNetwork::new();
        network.store_local(&name("/lib/a"), Version(5), "a");
        network.store_local(&name("/lib/sub/b"), Version(2), "b1");
        network.store_local(&name("/lib/sub/b"), Version(3), "b2");

        let session = network.open_session().await.unwrap();
        let mut errors = ErrorList::new();
        let pass = reconcile_local(
            &session,
            [name("/lib")],
            SHORT,
            Addressing::Versioned,
            &mut errors,
        )
        .await;

        assert!(errors.is_empty());
        assert_eq!(pass.record.get(&name("/lib/a")), Some(LocalEntry::Version(Version(5))));
        assert_eq!(
            pass.record.get(&name("/lib/sub/b")),
            Some(LocalEntry::Version(Version(3)))
        );
        assert_eq!(pass.record.len(), 2);
        // Every local round used local scope.
        assert!(network
            .registrations()
            .iter()
            .all(|i| i.scope == repofill_net::EnumerationScope::Local && i.min_sources == 1));
    }

    #[tokio::test]
    async fn test_local_registration_failure_is_recorded() {
        let network = MemoryNetwork::new();
        network.fail_registration(&name("/lib"));

        let session = network.open_session().await.unwrap();
        let mut errors = ErrorList::new();
        let pass = reconcile_local(
            &session,
            [name("/lib")],
            SHORT,
            Addressing::Versioned,
            &mut errors,
        )
        .await;

        assert!(pass.record.is_empty());
        assert_eq!(errors.into_vec(), vec!["ccnx:/lib".to_string()]);
    }

    proptest! {
        #[test]
        fn older_remote_never_admitted_after_newer_local(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
            prop_assume!(a < b);
            let p = Name::parse("/p").unwrap();
            let mut record = LocalVersionRecord::new();
            record.observe(p.clone(), Version(b), Addressing::Versioned);
            prop_assert!(!record.admits(&p, Version(a)));
        }
    }
}
