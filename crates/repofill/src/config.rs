//! Run configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use repofill_net::Addressing;
use repofill_sync::{TransferTarget, DEFAULT_CHUNK_SIZE};

/// Per-round deadline unless configured otherwise.
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration for one [`Driver`](crate::Driver) invocation.
///
/// Built once and never mutated during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateConfig {
    /// How names address their content.
    pub addressing: Addressing,
    /// Treat inputs as prefixes to enumerate rather than literal names.
    pub enumerate: bool,
    /// Reconcile against the local repository before fetching.
    pub verify: bool,
    /// Answers needed before a round ends early.
    pub required_answers: usize,
    /// Deadline for each enumeration round.
    pub round_timeout: Duration,
    /// Where fetched bytes go.
    pub target: TransferTarget,
    /// Transfer chunk size in bytes.
    pub chunk_size: usize,
}

impl Default for PopulateConfig {
    fn default() -> Self {
        Self {
            addressing: Addressing::Versioned,
            enumerate: false,
            verify: false,
            required_answers: 1,
            round_timeout: DEFAULT_ROUND_TIMEOUT,
            target: TransferTarget::Repository,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl PopulateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addressing(mut self, addressing: Addressing) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn with_enumerate(mut self, enumerate: bool) -> Self {
        self.enumerate = enumerate;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Set the quorum. Values below one are raised to one.
    pub fn with_required_answers(mut self, required: usize) -> Self {
        self.required_answers = required.max(1);
        self
    }

    /// Set the round deadline. Zero selects [`DEFAULT_ROUND_TIMEOUT`].
    pub fn with_round_timeout(mut self, timeout: Duration) -> Self {
        self.round_timeout = timeout;
        self.normalized()
    }

    pub fn with_target(mut self, target: TransferTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self.normalized()
    }

    /// Replace out-of-range values with their defaults.
    pub fn normalized(mut self) -> Self {
        self.required_answers = self.required_answers.max(1);
        if self.round_timeout.is_zero() {
            self.round_timeout = DEFAULT_ROUND_TIMEOUT;
        }
        if self.chunk_size == 0 {
            self.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        self
    }
}
