//! Content network traits.
//!
//! Implementations may sit on a real name-addressed network, a directory
//! tree or an in-memory script. All of them must be thread-safe.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use repofill_core::{Name, Segment};

use crate::error::Result;

/// Callback receiving the children one answering source reports for a
/// registered prefix.
///
/// May be invoked from any thread, any number of times per registration.
pub type ChildrenListener = Arc<dyn Fn(&Name, &[Segment]) + Send + Sync>;

/// Which sources may answer an enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EnumerationScope {
    /// Only the local repository.
    Local,
    /// Any source reachable on the network.
    #[default]
    Any,
}

/// How a name addresses its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Addressing {
    /// The name is a prefix; reads resolve its newest version.
    #[default]
    Versioned,
    /// The name addresses the content directly.
    Unversioned,
}

/// A request to enumerate the children of a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub prefix: Name,
    /// Number of distinct sources the caller intends to wait for.
    pub min_sources: usize,
    pub scope: EnumerationScope,
}

impl Interest {
    pub fn new(prefix: Name, min_sources: usize, scope: EnumerationScope) -> Self {
        Self {
            prefix,
            min_sources,
            scope,
        }
    }
}

/// Entry point to a content network.
#[async_trait]
pub trait ContentNetwork: Send + Sync {
    type Session: Session;

    /// Open one logical connection.
    async fn open_session(&self) -> Result<Self::Session>;
}

/// One open connection to a content network.
#[async_trait]
pub trait Session: Send + Sync {
    /// Ask for the children of `interest.prefix`.
    ///
    /// Answers are delivered to `listener` until [`Session::cancel_interest`]
    /// is called for the same prefix.
    async fn register_interest(&self, interest: Interest, listener: ChildrenListener)
        -> Result<()>;

    /// Stop delivering answers for a prefix.
    async fn cancel_interest(&self, prefix: &Name) -> Result<()>;

    /// Open a streamed read of the content under `name`.
    async fn open_read(&self, name: &Name, addressing: Addressing) -> Result<Box<dyn ByteStream>>;

    /// Open a streamed write into the local repository.
    ///
    /// `name` is the fully resolved name reported by [`ByteStream::name`].
    async fn open_write(&self, name: &Name, addressing: Addressing) -> Result<Box<dyn ByteSink>>;

    /// Close the session. Later calls fail with `NetError::Closed`.
    async fn close(&self) -> Result<()>;
}

/// A readable stream of content bytes.
#[async_trait]
pub trait ByteStream: Send {
    /// The fully resolved name being read (including the version marker for
    /// versioned reads).
    fn name(&self) -> &Name;

    /// Read up to `buf.len()` bytes. Returns 0 at end of stream.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release the stream.
    async fn close(&mut self) -> Result<()>;
}

/// A writable target in the local repository.
#[async_trait]
pub trait ByteSink: Send {
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Commit everything written and release the target.
    async fn finish(&mut self) -> Result<()>;

    /// Release the target without committing.
    async fn abort(&mut self) -> Result<()>;
}
