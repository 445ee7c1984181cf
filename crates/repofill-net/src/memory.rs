//! A scripted in-memory content network.
//!
//! Primarily for testing. Each answering source holds its own listing of
//! names; enumeration answers are delivered from spawned tasks, so the
//! listener runs concurrently with whoever registered the interest.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use repofill_core::{decode_version, is_version_marker, Name, Segment, Version};

use crate::error::{NetError, Result};
use crate::network::{
    Addressing, ByteSink, ByteStream, ChildrenListener, ContentNetwork, EnumerationScope,
    Interest, Session,
};

/// Handle to one answering source of a [`MemoryNetwork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub usize);

/// Children known under each prefix.
#[derive(Debug, Default)]
struct Listing {
    children: BTreeMap<Name, BTreeSet<Segment>>,
}

impl Listing {
    /// Record every segment of `name` as a child of the prefix before it.
    fn add_path(&mut self, name: &Name) {
        let segments = name.segments();
        for (i, segment) in segments.iter().enumerate() {
            let prefix = Name::from_segments(segments[..i].iter().cloned());
            self.children
                .entry(prefix)
                .or_default()
                .insert(segment.clone());
        }
    }

    fn add_child(&mut self, prefix: &Name, segment: Segment) {
        self.children
            .entry(prefix.clone())
            .or_default()
            .insert(segment);
    }

    fn children_of(&self, prefix: &Name) -> Option<Vec<Segment>> {
        self.children
            .get(prefix)
            .map(|set| set.iter().cloned().collect())
    }
}

#[derive(Debug, Default)]
struct Source {
    listing: Listing,
    delay: Duration,
}

#[derive(Debug, Default)]
struct NetworkState {
    sources: Vec<Source>,
    /// Listing of the local repository.
    local: Listing,
    /// Remote content keyed by fully resolved name.
    content: BTreeMap<Name, Bytes>,
    /// Content written into the local repository.
    stored: BTreeMap<Name, Bytes>,

    failing_registrations: HashSet<Name>,
    unreachable: HashSet<Name>,
    failing_writes: HashSet<Name>,
    broken_reads: HashSet<Name>,
    refuse_connections: bool,

    registrations: Vec<Interest>,
    cancellations: Vec<Name>,
    open_handles: usize,
    closed_sessions: usize,
}

fn lock(state: &Mutex<NetworkState>) -> MutexGuard<'_, NetworkState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted network shared by every session opened on it.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scripting
    // ─────────────────────────────────────────────────────────────────────────

    /// Add an answering source that replies immediately.
    pub fn add_source(&self) -> SourceId {
        self.add_source_with_delay(Duration::ZERO)
    }

    /// Add an answering source that replies after `delay`.
    pub fn add_source_with_delay(&self, delay: Duration) -> SourceId {
        let mut state = lock(&self.state);
        state.sources.push(Source {
            listing: Listing::default(),
            delay,
        });
        SourceId(state.sources.len() - 1)
    }

    /// Publish versioned content under `name` on a source.
    pub fn publish(&self, source: SourceId, name: &Name, version: Version, data: impl Into<Bytes>) {
        let resolved = name.child(version.to_segment());
        let mut state = lock(&self.state);
        if let Some(src) = state.sources.get_mut(source.0) {
            src.listing.add_path(&resolved);
        }
        state.content.insert(resolved, data.into());
    }

    /// Publish content addressed by `name` itself on a source.
    pub fn publish_unversioned(&self, source: SourceId, name: &Name, data: impl Into<Bytes>) {
        let mut state = lock(&self.state);
        if let Some(src) = state.sources.get_mut(source.0) {
            src.listing.add_path(name);
        }
        state.content.insert(name.clone(), data.into());
    }

    /// Add a raw child entry to a source's listing.
    pub fn add_child(&self, source: SourceId, prefix: &Name, segment: Segment) {
        let mut state = lock(&self.state);
        if let Some(src) = state.sources.get_mut(source.0) {
            src.listing.add_child(prefix, segment);
        }
    }

    /// Place versioned content in the local repository.
    pub fn store_local(&self, name: &Name, version: Version, data: impl Into<Bytes>) {
        let resolved = name.child(version.to_segment());
        let mut state = lock(&self.state);
        state.local.add_path(&resolved);
        state.stored.insert(resolved, data.into());
    }

    /// Make registrations for `prefix` fail.
    pub fn fail_registration(&self, prefix: &Name) {
        lock(&self.state).failing_registrations.insert(prefix.clone());
    }

    /// Make reads of `name` fail to resolve.
    pub fn make_unreachable(&self, name: &Name) {
        lock(&self.state).unreachable.insert(name.clone());
    }

    /// Make writes under `prefix` fail.
    pub fn fail_writes(&self, prefix: &Name) {
        lock(&self.state).failing_writes.insert(prefix.clone());
    }

    /// Make reads of `name` fail after the first chunk.
    pub fn break_reads(&self, name: &Name) {
        lock(&self.state).broken_reads.insert(name.clone());
    }

    /// Make `open_session` fail.
    pub fn refuse_connections(&self) {
        lock(&self.state).refuse_connections = true;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    /// Every interest registered so far, in order.
    pub fn registrations(&self) -> Vec<Interest> {
        lock(&self.state).registrations.clone()
    }

    /// Every cancelled prefix, in order.
    pub fn cancellations(&self) -> Vec<Name> {
        lock(&self.state).cancellations.clone()
    }

    /// Bytes stored locally under a resolved name.
    pub fn stored(&self, name: &Name) -> Option<Bytes> {
        lock(&self.state).stored.get(name).cloned()
    }

    /// Names stored locally, in order.
    pub fn stored_names(&self) -> Vec<Name> {
        lock(&self.state).stored.keys().cloned().collect()
    }

    /// Streams and sinks opened but not yet released.
    pub fn open_handles(&self) -> usize {
        lock(&self.state).open_handles
    }

    pub fn closed_sessions(&self) -> usize {
        lock(&self.state).closed_sessions
    }
}

#[async_trait]
impl ContentNetwork for MemoryNetwork {
    type Session = MemorySession;

    async fn open_session(&self) -> Result<MemorySession> {
        if lock(&self.state).refuse_connections {
            return Err(NetError::Connection("connection refused".into()));
        }
        Ok(MemorySession {
            state: Arc::clone(&self.state),
            active: Arc::new(Mutex::new(HashSet::new())),
            closed: AtomicBool::new(false),
        })
    }
}

/// Session on a [`MemoryNetwork`].
pub struct MemorySession {
    state: Arc<Mutex<NetworkState>>,
    /// Prefixes with a live registration.
    active: Arc<Mutex<HashSet<Name>>>,
    closed: AtomicBool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NetError::Closed);
        }
        Ok(())
    }

    fn is_active(active: &Mutex<HashSet<Name>>, prefix: &Name) -> bool {
        active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(prefix)
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn register_interest(
        &self,
        interest: Interest,
        listener: ChildrenListener,
    ) -> Result<()> {
        self.ensure_open()?;

        let answers: Vec<(Duration, Vec<Segment>)> = {
            let mut state = lock(&self.state);
            state.registrations.push(interest.clone());

            if state.failing_registrations.contains(&interest.prefix) {
                return Err(NetError::Registration {
                    prefix: interest.prefix.to_uri(),
                    reason: "registration refused".into(),
                });
            }

            match interest.scope {
                EnumerationScope::Local => state
                    .local
                    .children_of(&interest.prefix)
                    .map(|children| vec![(Duration::ZERO, children)])
                    .unwrap_or_default(),
                EnumerationScope::Any => state
                    .sources
                    .iter()
                    .filter_map(|src| {
                        src.listing
                            .children_of(&interest.prefix)
                            .map(|children| (src.delay, children))
                    })
                    .collect(),
            }
        };

        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(interest.prefix.clone());

        for (delay, children) in answers {
            let active = Arc::clone(&self.active);
            let listener = Arc::clone(&listener);
            let prefix = interest.prefix.clone();
            tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if Self::is_active(&active, &prefix) {
                    listener(&prefix, children.as_slice());
                }
            });
        }

        Ok(())
    }

    async fn cancel_interest(&self, prefix: &Name) -> Result<()> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(prefix);
        lock(&self.state).cancellations.push(prefix.clone());
        Ok(())
    }

    async fn open_read(&self, name: &Name, addressing: Addressing) -> Result<Box<dyn ByteStream>> {
        self.ensure_open()?;
        let mut state = lock(&self.state);

        let unresolved = |reason: &str| NetError::Resolution {
            name: name.to_uri(),
            reason: reason.to_string(),
        };

        if state.unreachable.contains(name) {
            return Err(unresolved("no route to content"));
        }

        let resolved = match addressing {
            Addressing::Unversioned => name.clone(),
            Addressing::Versioned => state
                .content
                .keys()
                .filter(|key| key.parent().as_ref() == Some(name))
                .filter_map(|key| {
                    let last = key.last()?;
                    if !is_version_marker(last) {
                        return None;
                    }
                    decode_version(last).ok().map(|v| (v, key))
                })
                .max_by_key(|(v, _)| *v)
                .map(|(_, key)| key.clone())
                .ok_or_else(|| unresolved("no version published"))?,
        };

        let data = state
            .content
            .get(&resolved)
            .cloned()
            .ok_or_else(|| unresolved("no content published"))?;
        let broken = state.broken_reads.contains(name);
        state.open_handles += 1;

        Ok(Box::new(MemoryStream {
            name: resolved,
            data,
            pos: 0,
            broken,
            released: false,
            state: Arc::clone(&self.state),
        }))
    }

    async fn open_write(&self, name: &Name, _addressing: Addressing) -> Result<Box<dyn ByteSink>> {
        self.ensure_open()?;
        let mut state = lock(&self.state);

        if state
            .failing_writes
            .iter()
            .any(|prefix| prefix.is_prefix_of(name))
        {
            return Err(NetError::Store {
                name: name.to_uri(),
                reason: "repository refused write".into(),
            });
        }
        state.open_handles += 1;

        Ok(Box::new(MemorySink {
            name: name.clone(),
            buffer: Vec::new(),
            released: false,
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.active
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            lock(&self.state).closed_sessions += 1;
        }
        Ok(())
    }
}

struct MemoryStream {
    name: Name,
    data: Bytes,
    pos: usize,
    broken: bool,
    released: bool,
    state: Arc<Mutex<NetworkState>>,
}

#[async_trait]
impl ByteStream for MemoryStream {
    fn name(&self) -> &Name {
        &self.name
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.released {
            return Err(NetError::Closed);
        }
        if self.broken && self.pos > 0 {
            return Err(NetError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "stream interrupted",
            )));
        }
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        if !std::mem::replace(&mut self.released, true) {
            lock(&self.state).open_handles -= 1;
        }
        Ok(())
    }
}

struct MemorySink {
    name: Name,
    buffer: Vec<u8>,
    released: bool,
    state: Arc<Mutex<NetworkState>>,
}

#[async_trait]
impl ByteSink for MemorySink {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if self.released {
            return Err(NetError::Closed);
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.released, true) {
            return Err(NetError::Closed);
        }
        let data = Bytes::from(std::mem::take(&mut self.buffer));
        let mut state = lock(&self.state);
        state.local.add_path(&self.name);
        state.stored.insert(self.name.clone(), data);
        state.open_handles -= 1;
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        if !std::mem::replace(&mut self.released, true) {
            lock(&self.state).open_handles -= 1;
        }
        Ok(())
    }
}
