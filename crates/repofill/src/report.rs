//! What a run did.

use std::fmt;

use serde::Serialize;

use repofill_core::Name;
use repofill_sync::{ErrorList, TransferReport};

/// Stages of a run, in the order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Init,
    Reconciling,
    Discovering,
    Transferring,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Init => "init",
            Phase::Reconciling => "reconciling",
            Phase::Discovering => "discovering",
            Phase::Transferring => "transferring",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Outcome of a [`Driver::run`](crate::Driver::run).
#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulateReport {
    /// Every input token, prefix and name that failed, in failure order.
    pub failures: ErrorList,
    /// Phases entered.
    pub phases: Vec<Phase>,
    /// Rounds run against the local repository.
    pub local_rounds: usize,
    /// Network-wide enumeration rounds.
    pub rounds: usize,
    /// Rounds that ended at their deadline.
    pub timed_out_rounds: usize,
    /// Prefixes or names skipped because the local copy is current.
    pub up_to_date: usize,
    /// Successful transfers, in transfer order.
    pub transferred: Vec<TransferReport>,
}

impl PopulateReport {
    /// Names that were transferred.
    pub fn transferred_names(&self) -> impl Iterator<Item = &Name> {
        self.transferred.iter().map(|t| &t.name)
    }

    /// Total bytes moved.
    pub fn bytes(&self) -> u64 {
        self.transferred.iter().map(|t| t.bytes).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
