//! Enumeration rounds.
//!
//! One [`EnumerationSession`] resolves the immediate children of one prefix.
//! The network delivers answers through a listener that may run on another
//! thread; the listener classifies children under the round lock, bumps the
//! answer count and wakes the waiter. The waiter sleeps until the quorum is
//! met or the absolute deadline passes, recomputing the remaining time after
//! every wake.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use repofill_core::{classify, Name, Segment, SegmentKind, Version};
use repofill_net::{ChildrenListener, EnumerationScope, Interest, Session};

use crate::error::{Result, SyncError};
use crate::reconcile::LocalVersionRecord;

/// Parameters of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundConfig {
    /// Distinct answers required before the round's data is final.
    pub quorum: usize,
    /// Time allowed for the round, measured from registration.
    pub timeout: Duration,
    pub scope: EnumerationScope,
}

impl RoundConfig {
    /// A network-wide round.
    pub fn network(quorum: usize, timeout: Duration) -> Self {
        Self {
            quorum: quorum.max(1),
            timeout,
            scope: EnumerationScope::Any,
        }
    }

    /// A round answered by the local repository only.
    pub fn local(timeout: Duration) -> Self {
        Self {
            quorum: 1,
            timeout,
            scope: EnumerationScope::Local,
        }
    }
}

/// Answer bookkeeping for the active round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnswerState {
    pub has_data: bool,
    /// One per listener invocation.
    pub distinct_answers: usize,
    pub timed_out: bool,
}

impl AnswerState {
    fn is_satisfied(&self, quorum: usize) -> bool {
        self.has_data && self.distinct_answers >= quorum
    }
}

/// What a finished round learned about its prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    pub prefix: Name,
    pub answer: AnswerState,
    /// Non-versioned children, as full names, to expand next.
    pub children: BTreeSet<Name>,
    /// Best version marker seen under the prefix that passed the local
    /// record filter.
    pub version: Option<Version>,
    /// Version markers dropped because the local repository already holds
    /// the same or a newer version.
    pub satisfied_locally: usize,
    /// Marker segments that carried the reserved prefix but did not decode.
    pub malformed_markers: usize,
    /// Non-version marker children, skipped as leaves.
    pub other_markers: usize,
}

impl RoundOutcome {
    /// Whether the round ended with data from enough sources.
    pub fn is_confirmed(&self, quorum: usize) -> bool {
        self.answer.is_satisfied(quorum) && !self.answer.timed_out
    }
}

/// Round state shared between the waiter and the listener.
struct RoundState {
    /// False once the round has stopped accepting answers.
    open: bool,
    outcome: RoundOutcome,
}

struct Shared {
    state: Mutex<RoundState>,
    notify: Notify,
    filter: Option<Arc<LocalVersionRecord>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RoundState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Listener body: classify one source's answer and wake the waiter.
    fn observe(&self, prefix: &Name, children: &[Segment]) {
        {
            let mut state = self.lock();
            if !state.open || prefix != &state.outcome.prefix {
                return;
            }
            let outcome = &mut state.outcome;

            for segment in children {
                match classify(segment) {
                    Ok(SegmentKind::Versioned(version)) => {
                        let wanted = self
                            .filter
                            .as_ref()
                            .map_or(true, |record| record.admits(prefix, version));
                        if !wanted {
                            outcome.satisfied_locally += 1;
                            continue;
                        }
                        // Ties keep the first seen.
                        match outcome.version {
                            Some(best) if best >= version => {}
                            _ => outcome.version = Some(version),
                        }
                    }
                    Ok(SegmentKind::Marker) => {
                        tracing::debug!(prefix = %prefix, "skipping marker child {}", segment);
                        outcome.other_markers += 1;
                    }
                    Ok(SegmentKind::Plain) => {
                        outcome.children.insert(prefix.child(segment.clone()));
                    }
                    Err(e) => {
                        tracing::warn!(prefix = %prefix, "ignoring child: {}", e);
                        outcome.malformed_markers += 1;
                    }
                }
            }

            outcome.answer.has_data = true;
            outcome.answer.distinct_answers += 1;
        }
        self.notify.notify_one();
    }
}

/// One registration/wait/cancel cycle for a single prefix.
pub struct EnumerationSession {
    prefix: Name,
    config: RoundConfig,
    shared: Arc<Shared>,
}

impl EnumerationSession {
    /// Prepare a round. `filter` applies the local reconciliation rule to
    /// every version marker observed.
    pub fn new(prefix: Name, config: RoundConfig, filter: Option<Arc<LocalVersionRecord>>) -> Self {
        let outcome = RoundOutcome {
            prefix: prefix.clone(),
            ..RoundOutcome::default()
        };
        Self {
            prefix,
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(RoundState {
                    open: true,
                    outcome,
                }),
                notify: Notify::new(),
                filter,
            }),
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    /// The callback handed to the network for this round.
    pub fn listener(&self) -> ChildrenListener {
        let shared = Arc::clone(&self.shared);
        Arc::new(move |prefix: &Name, children: &[Segment]| shared.observe(prefix, children))
    }

    /// Run the round to completion.
    ///
    /// Interest is cancelled on every path; cancellation errors are only
    /// logged. A registration failure ends the round with an error.
    pub async fn run<S: Session + ?Sized>(self, session: &S) -> Result<RoundOutcome> {
        let interest = Interest::new(self.prefix.clone(), self.config.quorum, self.config.scope);
        let started = Instant::now();

        let registered = session.register_interest(interest, self.listener()).await;
        if registered.is_ok() {
            self.wait().await;
        }
        self.close();

        if let Err(e) = session.cancel_interest(&self.prefix).await {
            tracing::debug!(prefix = %self.prefix, "cancel failed: {}", e);
        }

        registered.map_err(|source| SyncError::Registration {
            prefix: self.prefix.to_uri(),
            source,
        })?;

        let outcome = self.take_outcome();
        tracing::debug!(
            prefix = %self.prefix,
            scope = ?self.config.scope,
            answers = outcome.answer.distinct_answers,
            timed_out = outcome.answer.timed_out,
            children = outcome.children.len(),
            version = ?outcome.version,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "round finished"
        );
        Ok(outcome)
    }

    /// Block until the quorum is met or the deadline passes.
    async fn wait(&self) {
        let deadline = Instant::now() + self.config.timeout;
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut state = self.shared.lock();
                let answer = &mut state.outcome.answer;
                if answer.is_satisfied(self.config.quorum) {
                    return;
                }
                if Instant::now() >= deadline {
                    answer.timed_out = true;
                    return;
                }
            }
            // Wakes on an answer or at the deadline; either way re-check.
            let _ = tokio::time::timeout_at(deadline, notified).await;
        }
    }

    /// Stop accepting answers; late callbacks become no-ops.
    fn close(&self) {
        self.shared.lock().open = false;
    }

    fn take_outcome(&self) -> RoundOutcome {
        std::mem::take(&mut self.shared.lock().outcome)
    }
}
