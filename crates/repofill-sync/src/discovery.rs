//! Network-wide discovery.
//!
//! Drains a frontier one prefix at a time. Every round either queues more
//! prefixes (plain children) or selects its prefix for download (a version
//! marker that passed the local record). Rounds run strictly one after
//! another.

use std::sync::Arc;

use repofill_core::{Frontier, Name};
use repofill_net::Session;

use crate::download::DownloadSet;
use crate::failures::ErrorList;
use crate::reconcile::LocalVersionRecord;
use crate::session::{EnumerationSession, RoundConfig};

/// Counters gathered while discovering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub rounds: usize,
    pub timed_out_rounds: usize,
    /// Prefixes whose remote versions were all already stored locally.
    pub up_to_date: usize,
}

/// Breadth traversal state for one run.
pub struct Discovery {
    frontier: Frontier,
    downloads: DownloadSet,
    config: RoundConfig,
    filter: Option<Arc<LocalVersionRecord>>,
    stats: DiscoveryStats,
}

impl Discovery {
    /// Seed a traversal. `filter` is the local record when verifying.
    pub fn new(
        seeds: impl IntoIterator<Item = Name>,
        config: RoundConfig,
        filter: Option<Arc<LocalVersionRecord>>,
    ) -> Self {
        let mut frontier = Frontier::new();
        frontier.seed(seeds);
        Self {
            frontier,
            downloads: DownloadSet::new(),
            config,
            filter,
            stats: DiscoveryStats::default(),
        }
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn downloads(&self) -> &DownloadSet {
        &self.downloads
    }

    pub fn stats(&self) -> DiscoveryStats {
        self.stats
    }

    pub fn is_done(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Expand the smallest pending prefix.
    ///
    /// Returns the prefix processed, or `None` once the frontier is empty.
    /// A prefix whose round cannot start is recorded in `errors` and its
    /// subtree is left unexplored.
    pub async fn step<S: Session + ?Sized>(
        &mut self,
        session: &S,
        errors: &mut ErrorList,
    ) -> Option<Name> {
        let prefix = self.frontier.pop_min()?;
        let round = EnumerationSession::new(prefix.clone(), self.config, self.filter.clone());

        match round.run(session).await {
            Ok(outcome) => {
                self.stats.rounds += 1;
                if outcome.answer.timed_out {
                    self.stats.timed_out_rounds += 1;
                }
                if outcome.version.is_some() {
                    self.downloads.insert(prefix.clone());
                } else if outcome.satisfied_locally > 0 {
                    tracing::debug!(prefix = %prefix, "already up to date locally");
                    self.stats.up_to_date += 1;
                }
                for child in outcome.children {
                    self.frontier.insert(child);
                }
            }
            Err(e) => {
                tracing::warn!("{}", e);
                errors.push_name(&prefix);
            }
        }

        Some(prefix)
    }

    /// Run rounds until the frontier is empty.
    pub async fn run<S: Session + ?Sized>(&mut self, session: &S, errors: &mut ErrorList) {
        tracing::debug!(seeds = self.frontier.len(), "starting enumeration");
        while self.step(session, errors).await.is_some() {}
        tracing::debug!(
            rounds = self.stats.rounds,
            selected = self.downloads.len(),
            "ending enumeration"
        );
    }

    /// Finish and hand over the selected names.
    pub fn into_downloads(self) -> DownloadSet {
        self.downloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repofill_core::{Segment, Version};
    use repofill_net::{Addressing, ContentNetwork, MemoryNetwork};
    use std::time::Duration;

    const SHORT: Duration = Duration::from_millis(150);

    fn name(s: &str) -> Name {
        Name::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_one_round_splits_children_and_versions() {
        let network = MemoryNetwork::new();
        let src = network.add_source();
        network.add_child(src, &name("/a"), Segment::from("b"));
        network.add_child(src, &name("/a"), Segment::from("=FD1"));

        let session = network.open_session().await.unwrap();
        let mut errors = ErrorList::new();
        let mut discovery = Discovery::new([name("/a")], RoundConfig::network(1, SHORT), None);

        assert_eq!(discovery.step(&session, &mut errors).await, Some(name("/a")));
        assert_eq!(discovery.frontier().iter().cloned().collect::<Vec<_>>(), vec![name("/a/b")]);
        assert_eq!(discovery.downloads().iter().cloned().collect::<Vec<_>>(), vec![name("/a")]);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_full_traversal_selects_every_versioned_prefix() {
        let network = MemoryNetwork::new();
        let src = network.add_source();
        network.publish(src, &name("/lib/a"), Version(1), "a");
        network.publish(src, &name("/lib/sub/b"), Version(2), "b");
        network.publish(src, &name("/other/c"), Version(3), "c");

        let session = network.open_session().await.unwrap();
        let mut errors = ErrorList::new();
        let mut discovery = Discovery::new([name("/lib")], RoundConfig::network(1, SHORT), None);
        discovery.run(&session, &mut errors).await;

        assert!(discovery.is_done());
        let selected: Vec<_> = discovery.into_downloads().into_iter().collect();
        assert_eq!(selected, vec![name("/lib/a"), name("/lib/sub/b")]);
    }

    #[tokio::test]
    async fn test_registration_failure_prunes_subtree() {
        let network = MemoryNetwork::new();
        let src = network.add_source();
        network.publish(src, &name("/lib/bad/x"), Version(1), "x");
        network.publish(src, &name("/lib/good"), Version(1), "g");
        network.fail_registration(&name("/lib/bad"));

        let session = network.open_session().await.unwrap();
        let mut errors = ErrorList::new();
        let mut discovery = Discovery::new([name("/lib")], RoundConfig::network(1, SHORT), None);
        discovery.run(&session, &mut errors).await;

        assert_eq!(errors.into_vec(), vec!["ccnx:/lib/bad".to_string()]);
        let selected: Vec<_> = discovery.into_downloads().into_iter().collect();
        assert_eq!(selected, vec![name("/lib/good")]);
    }

    #[tokio::test]
    async fn test_verify_filter_applies_reconciliation_rule() {
        let network = MemoryNetwork::new();
        let src = network.add_source();
        network.publish(src, &name("/p/same"), Version(5), "s");
        network.publish(src, &name("/p/older"), Version(3), "o");
        network.publish(src, &name("/p/newer"), Version(9), "n");

        let mut record = LocalVersionRecord::new();
        for child in ["same", "older", "newer"] {
            record.observe(name("/p").child(Segment::from(child)), Version(5), Addressing::Versioned);
        }

        let session = network.open_session().await.unwrap();
        let mut errors = ErrorList::new();
        let mut discovery = Discovery::new(
            [name("/p")],
            RoundConfig::network(1, SHORT),
            Some(Arc::new(record)),
        );
        discovery.run(&session, &mut errors).await;

        assert_eq!(discovery.stats().up_to_date, 2);
        let selected: Vec<_> = discovery.into_downloads().into_iter().collect();
        assert_eq!(selected, vec![name("/p/newer")]);
    }

    #[tokio::test]
    async fn test_overlapping_answers_do_not_reexpand() {
        let network = MemoryNetwork::new();
        let first = network.add_source();
        let second = network.add_source();
        network.publish(first, &name("/a/b/doc"), Version(1), "x");
        network.publish(second, &name("/a/b/doc"), Version(1), "x");

        let session = network.open_session().await.unwrap();
        let mut errors = ErrorList::new();
        let mut discovery = Discovery::new([name("/a")], RoundConfig::network(2, SHORT), None);
        discovery.run(&session, &mut errors).await;

        let prefixes: Vec<_> = network.registrations().into_iter().map(|i| i.prefix).collect();
        assert_eq!(prefixes, vec![name("/a"), name("/a/b"), name("/a/b/doc")]);
        assert_eq!(discovery.stats().timed_out_rounds, 0);
    }
}
