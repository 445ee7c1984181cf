//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tempfile::TempDir;

use repofill_core::{Name, Version};
use repofill_net::{DirNetwork, MemoryNetwork, SourceId};

/// Parse a name, panicking on malformed test input.
pub fn name(text: &str) -> Name {
    Name::parse(text).unwrap_or_else(|e| panic!("bad test name {:?}: {}", text, e))
}

/// A scripted network with a fixed set of answering sources.
pub struct NetworkFixture {
    pub network: MemoryNetwork,
    pub sources: Vec<SourceId>,
}

impl NetworkFixture {
    /// One immediate source.
    pub fn new() -> Self {
        Self::with_sources(1)
    }

    /// `count` immediate sources.
    pub fn with_sources(count: usize) -> Self {
        Self::with_delays(&vec![Duration::ZERO; count])
    }

    /// One source per delay, each answering after its delay.
    pub fn with_delays(delays: &[Duration]) -> Self {
        let network = MemoryNetwork::new();
        let sources = delays
            .iter()
            .map(|delay| network.add_source_with_delay(*delay))
            .collect();
        Self { network, sources }
    }

    /// A handle on the network, for a driver to own.
    pub fn network(&self) -> MemoryNetwork {
        self.network.clone()
    }

    /// Publish a version of `path` on every source.
    pub fn publish(&self, path: &str, version: u64, data: impl Into<Bytes>) {
        let data = data.into();
        for source in &self.sources {
            self.network
                .publish(*source, &name(path), Version(version), data.clone());
        }
    }

    /// Publish a version of `path` on a single source.
    pub fn publish_on(&self, source: usize, path: &str, version: u64, data: impl Into<Bytes>) {
        self.network
            .publish(self.sources[source], &name(path), Version(version), data);
    }

    /// Publish unversioned content at `path` on every source.
    pub fn publish_unversioned(&self, path: &str, data: impl Into<Bytes>) {
        let data = data.into();
        for source in &self.sources {
            self.network
                .publish_unversioned(*source, &name(path), data.clone());
        }
    }

    /// Place a version of `path` in the local repository.
    pub fn store_local(&self, path: &str, version: u64, data: impl Into<Bytes>) {
        self.network.store_local(&name(path), Version(version), data);
    }

    /// Bytes stored locally for one version of `path`.
    pub fn stored(&self, path: &str, version: u64) -> Option<Bytes> {
        self.network
            .stored(&name(path).child(Version(version).to_segment()))
    }
}

impl Default for NetworkFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A network directory and a repository directory under one temp dir.
pub struct DirFixture {
    root: TempDir,
}

impl DirFixture {
    pub fn new() -> io::Result<Self> {
        let root = TempDir::new()?;
        std::fs::create_dir_all(root.path().join("network"))?;
        Ok(Self { root })
    }

    pub fn network_dir(&self) -> PathBuf {
        self.root.path().join("network")
    }

    pub fn repo_dir(&self) -> PathBuf {
        self.root.path().join("repo")
    }

    pub fn network(&self) -> DirNetwork {
        DirNetwork::new(self.network_dir(), self.repo_dir())
    }

    /// Publish a version of `path` into the network directory.
    pub fn publish(&self, path: &str, version: u64, data: &[u8]) -> io::Result<()> {
        write_version(&self.network_dir(), path, version, data)
    }

    /// Place a version of `path` in the repository directory.
    pub fn store_local(&self, path: &str, version: u64, data: &[u8]) -> io::Result<()> {
        write_version(&self.repo_dir(), path, version, data)
    }

    /// Read one stored version of `path` back from the repository.
    pub fn read_local(&self, path: &str, version: u64) -> io::Result<Vec<u8>> {
        std::fs::read(version_path(&self.repo_dir(), path, version))
    }
}

fn version_path(root: &Path, path: &str, version: u64) -> PathBuf {
    let mut dir = root.to_path_buf();
    for segment in name(path).segments() {
        dir.push(&*String::from_utf8_lossy(segment.as_bytes()));
    }
    dir.join(Version(version).to_segment().to_string())
}

fn write_version(root: &Path, path: &str, version: u64, data: &[u8]) -> io::Result<()> {
    let file = version_path(root, path, version);
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(file, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use repofill_core::Segment;
    use repofill_net::{
        Addressing, ByteStream, ChildrenListener, ContentNetwork, EnumerationScope, Interest,
        Session,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_publish_reaches_every_source() {
        let fixture = NetworkFixture::with_sources(3);
        fixture.publish("/a/doc", 1, "x");

        let answers = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&answers);
        let listener: ChildrenListener = Arc::new(move |_: &Name, _: &[Segment]| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let session = fixture.network().open_session().await.unwrap();
        session
            .register_interest(Interest::new(name("/a"), 3, EnumerationScope::Any), listener)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(answers.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_store_local_is_visible() {
        let fixture = NetworkFixture::new();
        fixture.store_local("/a/doc", 4, "local");
        assert_eq!(fixture.stored("/a/doc", 4), Some(Bytes::from_static(b"local")));
        assert_eq!(fixture.stored("/a/doc", 5), None);
    }

    #[tokio::test]
    async fn test_dir_fixture_serves_published_versions() {
        let fixture = DirFixture::new().unwrap();
        fixture.publish("/a/doc", 1, b"old").unwrap();
        fixture.publish("/a/doc", 2, b"new").unwrap();

        let session = fixture.network().open_session().await.unwrap();
        let mut stream = session
            .open_read(&name("/a/doc"), Addressing::Versioned)
            .await
            .unwrap();
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.unwrap();

        assert_eq!(&buf[..n], b"new");
        assert_eq!(stream.name(), &name("/a/doc").child(Version(2).to_segment()));
    }
}
