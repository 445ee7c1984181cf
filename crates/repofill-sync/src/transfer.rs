//! The transfer pipeline.
//!
//! Streams each selected name from the network and, when the target is the
//! local repository, copies it chunk by chunk into a write target. Both
//! handles are released on every exit path. A failure is confined to its
//! own name.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use repofill_core::Name;
use repofill_net::{Addressing, ByteSink, ByteStream, NetError, Session};

use crate::error::{Result, SyncError};
use crate::failures::ErrorList;

/// Size of each read/write chunk unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Where fetched bytes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransferTarget {
    /// Persist into the local repository.
    #[default]
    Repository,
    /// Only pull the bytes through the network, warming in-network caches.
    CacheOnly,
}

/// A completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReport {
    /// The name as requested.
    pub name: Name,
    /// The name the network resolved it to.
    pub resolved: Name,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Moves content for resolved names.
pub struct TransferPipeline<'a, S: Session + ?Sized> {
    session: &'a S,
    addressing: Addressing,
    target: TransferTarget,
    chunk_size: usize,
}

impl<'a, S: Session + ?Sized> TransferPipeline<'a, S> {
    pub fn new(session: &'a S, addressing: Addressing, target: TransferTarget) -> Self {
        Self {
            session,
            addressing,
            target,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the chunk size (at least one byte).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Transfer one name.
    pub async fn transfer(&self, name: &Name) -> Result<TransferReport> {
        let started = Instant::now();

        let mut stream = self
            .session
            .open_read(name, self.addressing)
            .await
            .map_err(|e| SyncError::transfer(name, e))?;
        let resolved = stream.name().clone();

        let mut sink = match self.target {
            TransferTarget::CacheOnly => None,
            TransferTarget::Repository => {
                match self.session.open_write(&resolved, self.addressing).await {
                    Ok(sink) => Some(sink),
                    Err(e) => {
                        release_stream(stream.as_mut(), name).await;
                        return Err(SyncError::transfer(name, e));
                    }
                }
            }
        };

        let copied = copy_chunks(stream.as_mut(), sink.as_deref_mut(), self.chunk_size).await;
        release_stream(stream.as_mut(), name).await;

        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Some(sink) = sink.as_mut() {
                    if let Err(abort) = sink.abort().await {
                        tracing::debug!(name = %name, "abort failed: {}", abort);
                    }
                }
                return Err(SyncError::transfer(name, e));
            }
        };

        if let Some(sink) = sink.as_mut() {
            sink.finish()
                .await
                .map_err(|e| SyncError::transfer(name, e))?;
        }

        Ok(TransferReport {
            name: name.clone(),
            resolved,
            bytes,
            elapsed: started.elapsed(),
        })
    }

    /// Transfer every name in order, recording failures and carrying on.
    pub async fn transfer_all<'n>(
        &self,
        names: impl IntoIterator<Item = &'n Name>,
        errors: &mut ErrorList,
    ) -> Vec<TransferReport> {
        let mut done = Vec::new();
        for name in names {
            match self.transfer(name).await {
                Ok(report) => {
                    match self.target {
                        TransferTarget::Repository => {
                            tracing::info!("added {} to the local repository", name.to_uri())
                        }
                        TransferTarget::CacheOnly => {
                            tracing::info!("fetched {} through the network cache", name.to_uri())
                        }
                    }
                    tracing::debug!(
                        name = %name,
                        bytes = report.bytes,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "transfer took {}ms",
                        report.elapsed.as_millis()
                    );
                    done.push(report);
                }
                Err(e) => {
                    tracing::warn!("cannot populate {}: {}", name.to_uri(), e);
                    errors.push_name(name);
                }
            }
        }
        done
    }
}

async fn copy_chunks(
    stream: &mut dyn ByteStream,
    mut sink: Option<&mut (dyn ByteSink + 'static)>,
    chunk_size: usize,
) -> std::result::Result<u64, NetError> {
    let mut buffer = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let n = stream.read(&mut buffer).await?;
        if n == 0 {
            return Ok(total);
        }
        if let Some(sink) = sink.as_mut() {
            sink.write_all(&buffer[..n]).await?;
        }
        total += n as u64;
    }
}

async fn release_stream(stream: &mut dyn ByteStream, name: &Name) {
    if let Err(e) = stream.close().await {
        tracing::debug!(name = %name, "close failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use repofill_core::Version;
    use repofill_net::{ContentNetwork, MemoryNetwork};

    fn name(s: &str) -> Name {
        Name::parse(s).unwrap()
    }

    fn network_with(docs: &[(&str, u64, &'static str)]) -> MemoryNetwork {
        let network = MemoryNetwork::new();
        let src = network.add_source();
        for (n, v, data) in docs {
            network.publish(src, &name(n), Version(*v), *data);
        }
        network
    }

    #[tokio::test]
    async fn test_repository_transfer_persists_resolved_name() {
        let payload = "x".repeat(3000);
        let network = MemoryNetwork::new();
        let src = network.add_source();
        network.publish(src, &name("/a/doc"), Version(2), payload.clone());

        let session = network.open_session().await.unwrap();
        let pipeline = TransferPipeline::new(&session, Addressing::Versioned, TransferTarget::Repository);
        let report = pipeline.transfer(&name("/a/doc")).await.unwrap();

        let resolved = name("/a/doc").child(Version(2).to_segment());
        assert_eq!(report.resolved, resolved);
        assert_eq!(report.bytes, 3000);
        assert_eq!(network.stored(&resolved), Some(Bytes::from(payload)));
        assert_eq!(network.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_copy_chunks_through_boxed_sink() {
        let network = network_with(&[("/a/doc", 1, "chunked payload")]);
        let session = network.open_session().await.unwrap();

        let mut stream = session
            .open_read(&name("/a/doc"), Addressing::Versioned)
            .await
            .unwrap();
        let resolved = stream.name().clone();
        let mut sink = Some(
            session
                .open_write(&resolved, Addressing::Versioned)
                .await
                .unwrap(),
        );

        let copied = copy_chunks(stream.as_mut(), sink.as_deref_mut(), 4).await.unwrap();
        assert_eq!(copied, 15);
        if let Some(sink) = sink.as_mut() {
            sink.finish().await.unwrap();
        }
        release_stream(stream.as_mut(), &resolved).await;

        assert_eq!(network.stored(&resolved), Some(Bytes::from_static(b"chunked payload")));
        assert_eq!(network.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_cache_only_transfer_stores_nothing() {
        let network = network_with(&[("/a/doc", 1, "hello")]);
        let session = network.open_session().await.unwrap();
        let pipeline = TransferPipeline::new(&session, Addressing::Versioned, TransferTarget::CacheOnly);

        let report = pipeline.transfer(&name("/a/doc")).await.unwrap();
        assert_eq!(report.bytes, 5);
        assert!(network.stored_names().is_empty());
        assert_eq!(network.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_name_is_isolated() {
        let network = network_with(&[("/a/one", 1, "1"), ("/a/two", 1, "2"), ("/a/three", 1, "3")]);
        network.make_unreachable(&name("/a/two"));

        let session = network.open_session().await.unwrap();
        let pipeline = TransferPipeline::new(&session, Addressing::Versioned, TransferTarget::Repository);
        let names = [name("/a/one"), name("/a/two"), name("/a/three")];
        let mut errors = ErrorList::new();
        let done = pipeline.transfer_all(&names, &mut errors).await;

        assert_eq!(errors.into_vec(), vec!["ccnx:/a/two".to_string()]);
        assert_eq!(done.len(), 2);
        assert_eq!(network.stored_names().len(), 2);
    }

    #[tokio::test]
    async fn test_read_error_midway_aborts_write() {
        let network = network_with(&[("/a/doc", 1, "0123456789")]);
        network.break_reads(&name("/a/doc"));

        let session = network.open_session().await.unwrap();
        let pipeline = TransferPipeline::new(&session, Addressing::Versioned, TransferTarget::Repository)
            .with_chunk_size(4);
        let err = pipeline.transfer(&name("/a/doc")).await.unwrap_err();

        assert!(matches!(err, SyncError::Transfer { ref name, .. } if name == "ccnx:/a/doc"));
        assert!(network.stored_names().is_empty());
        assert_eq!(network.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_write_refusal_releases_stream() {
        let network = network_with(&[("/a/doc", 1, "data")]);
        network.fail_writes(&name("/a"));

        let session = network.open_session().await.unwrap();
        let pipeline = TransferPipeline::new(&session, Addressing::Versioned, TransferTarget::Repository);
        let mut errors = ErrorList::new();
        let done = pipeline.transfer_all([&name("/a/doc")], &mut errors).await;

        assert!(done.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(network.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_unversioned_addressing_reads_name_directly() {
        let network = MemoryNetwork::new();
        let src = network.add_source();
        network.publish_unversioned(src, &name("/a/plain"), "raw");

        let session = network.open_session().await.unwrap();
        let pipeline =
            TransferPipeline::new(&session, Addressing::Unversioned, TransferTarget::Repository);
        let report = pipeline.transfer(&name("/a/plain")).await.unwrap();

        assert_eq!(report.resolved, name("/a/plain"));
        assert_eq!(network.stored(&name("/a/plain")), Some(Bytes::from_static(b"raw")));
    }
}
