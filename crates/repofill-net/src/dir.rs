//! Directory-backed content network.
//!
//! One directory tree plays the network, another plays the local
//! repository. A directory is a prefix; its entries are the children. A file
//! named like a version marker (`=FD02`) holds one version of its parent
//! directory's content. Any other regular file is unversioned content
//! addressed by its own path. Entries starting with `.` are hidden.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use repofill_core::{decode_version, is_version_marker, Name, Segment};

use crate::error::{NetError, Result};
use crate::network::{
    Addressing, ByteSink, ByteStream, ChildrenListener, ContentNetwork, EnumerationScope,
    Interest, Session,
};

/// Content network over two directory trees.
#[derive(Debug, Clone)]
pub struct DirNetwork {
    network_root: PathBuf,
    repo_root: PathBuf,
}

impl DirNetwork {
    /// Create a network serving `network_root` and storing into `repo_root`.
    pub fn new(network_root: impl Into<PathBuf>, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            network_root: network_root.into(),
            repo_root: repo_root.into(),
        }
    }
}

#[async_trait]
impl ContentNetwork for DirNetwork {
    type Session = DirSession;

    async fn open_session(&self) -> Result<DirSession> {
        let meta = fs::metadata(&self.network_root).await.map_err(|e| {
            NetError::Connection(format!("{}: {}", self.network_root.display(), e))
        })?;
        if !meta.is_dir() {
            return Err(NetError::Connection(format!(
                "{} is not a directory",
                self.network_root.display()
            )));
        }
        fs::create_dir_all(&self.repo_root).await.map_err(|e| {
            NetError::Connection(format!("{}: {}", self.repo_root.display(), e))
        })?;

        tracing::debug!(
            network = %self.network_root.display(),
            repo = %self.repo_root.display(),
            "opened directory session"
        );

        Ok(DirSession {
            network_root: self.network_root.clone(),
            repo_root: self.repo_root.clone(),
            active: Arc::new(Mutex::new(HashSet::new())),
            closed: AtomicBool::new(false),
        })
    }
}

/// Session on a [`DirNetwork`].
pub struct DirSession {
    network_root: PathBuf,
    repo_root: PathBuf,
    active: Arc<Mutex<HashSet<Name>>>,
    closed: AtomicBool,
}

/// Map a name onto a path below `root`.
fn path_for(root: &Path, name: &Name) -> std::result::Result<PathBuf, String> {
    let mut path = root.to_path_buf();
    for segment in name.segments() {
        let part = std::str::from_utf8(segment.as_bytes())
            .map_err(|_| format!("segment {} is not valid UTF-8", segment))?;
        if part == "." || part == ".." || part.contains(std::path::MAIN_SEPARATOR) {
            return Err(format!("segment {:?} cannot be mapped to a path", part));
        }
        path.push(part);
    }
    Ok(path)
}

/// Visible entries of a directory, or an empty list for a file. `None` when
/// nothing exists at `path`.
async fn list_children(path: &Path) -> Option<Vec<Segment>> {
    let meta = fs::metadata(path).await.ok()?;
    if !meta.is_dir() {
        return Some(Vec::new());
    }

    let mut entries = fs::read_dir(path).await.ok()?;
    let mut children = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Ok(file_name) = entry.file_name().into_string() {
            if !file_name.starts_with('.') {
                children.push(Segment::from(file_name));
            }
        }
    }
    children.sort();
    Some(children)
}

impl DirSession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NetError::Closed);
        }
        Ok(())
    }

    fn active(&self) -> std::sync::MutexGuard<'_, HashSet<Name>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Newest version file inside a versioned content directory.
    async fn newest_version(dir: &Path) -> Option<Segment> {
        list_children(dir)
            .await?
            .into_iter()
            .filter(is_version_marker)
            .filter_map(|segment| decode_version(&segment).ok().map(|v| (v, segment)))
            .max_by_key(|(v, _)| *v)
            .map(|(_, segment)| segment)
    }
}

#[async_trait]
impl Session for DirSession {
    async fn register_interest(
        &self,
        interest: Interest,
        listener: ChildrenListener,
    ) -> Result<()> {
        self.ensure_open()?;

        let root = match interest.scope {
            EnumerationScope::Local => &self.repo_root,
            EnumerationScope::Any => &self.network_root,
        };
        let path = path_for(root, &interest.prefix).map_err(|reason| NetError::Registration {
            prefix: interest.prefix.to_uri(),
            reason,
        })?;

        self.active().insert(interest.prefix.clone());

        let active = Arc::clone(&self.active);
        let prefix = interest.prefix;
        tokio::spawn(async move {
            let Some(children) = list_children(&path).await else {
                tracing::debug!(prefix = %prefix, "nothing to enumerate");
                return;
            };
            let live = active
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&prefix);
            if live {
                listener(&prefix, children.as_slice());
            }
        });

        Ok(())
    }

    async fn cancel_interest(&self, prefix: &Name) -> Result<()> {
        self.active().remove(prefix);
        Ok(())
    }

    async fn open_read(&self, name: &Name, addressing: Addressing) -> Result<Box<dyn ByteStream>> {
        self.ensure_open()?;

        let unresolved = |reason: String| NetError::Resolution {
            name: name.to_uri(),
            reason,
        };
        let path = path_for(&self.network_root, name).map_err(unresolved)?;

        let (resolved, file_path) = match addressing {
            Addressing::Unversioned => (name.clone(), path),
            Addressing::Versioned => {
                let version = Self::newest_version(&path)
                    .await
                    .ok_or_else(|| unresolved("no version published".into()))?;
                let file_path = path.join(&*String::from_utf8_lossy(version.as_bytes()));
                (name.child(version), file_path)
            }
        };

        let file = File::open(&file_path)
            .await
            .map_err(|e| unresolved(e.to_string()))?;

        Ok(Box::new(DirStream {
            name: resolved,
            file: Some(file),
        }))
    }

    async fn open_write(&self, name: &Name, _addressing: Addressing) -> Result<Box<dyn ByteSink>> {
        self.ensure_open()?;

        let refused = |reason: String| NetError::Store {
            name: name.to_uri(),
            reason,
        };
        let dest = path_for(&self.repo_root, name).map_err(refused)?;
        let file_name = dest
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| refused("cannot store at the repository root".into()))?
            .to_string();
        let parent = dest
            .parent()
            .ok_or_else(|| refused("destination has no parent".into()))?
            .to_path_buf();

        fs::create_dir_all(&parent)
            .await
            .map_err(|e| refused(e.to_string()))?;
        let partial = parent.join(format!(".{}.partial", file_name));
        let file = File::create(&partial)
            .await
            .map_err(|e| refused(e.to_string()))?;

        Ok(Box::new(DirSink {
            partial,
            dest,
            file: Some(file),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.active().clear();
        Ok(())
    }
}

struct DirStream {
    name: Name,
    file: Option<File>,
}

#[async_trait]
impl ByteStream for DirStream {
    fn name(&self) -> &Name {
        &self.name
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let file = self.file.as_mut().ok_or(NetError::Closed)?;
        Ok(file.read(buf).await?)
    }

    async fn close(&mut self) -> Result<()> {
        self.file.take();
        Ok(())
    }
}

/// Writes into a hidden `.partial` file, renamed into place on finish.
struct DirSink {
    partial: PathBuf,
    dest: PathBuf,
    file: Option<File>,
}

#[async_trait]
impl ByteSink for DirSink {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let file = self.file.as_mut().ok_or(NetError::Closed)?;
        file.write_all(data).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        let file = self.file.take().ok_or(NetError::Closed)?;
        let committed = commit(file, &self.partial, &self.dest).await;
        if committed.is_err() {
            let _ = fs::remove_file(&self.partial).await;
        }
        committed
    }

    async fn abort(&mut self) -> Result<()> {
        if self.file.take().is_some() {
            // Best effort, the partial file is hidden from listings anyway.
            let _ = fs::remove_file(&self.partial).await;
        }
        Ok(())
    }
}

/// Flush `file` to disk and move it from `partial` to `dest`.
async fn commit(mut file: File, partial: &Path, dest: &Path) -> Result<()> {
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(partial, dest).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use repofill_core::Version;
    use std::time::Duration;
    use tempfile::TempDir;

    fn name(s: &str) -> Name {
        Name::parse(s).unwrap()
    }

    struct Dirs {
        _tmp: TempDir,
        network: PathBuf,
        repo: PathBuf,
    }

    fn dirs() -> Dirs {
        let tmp = TempDir::new().unwrap();
        let network = tmp.path().join("network");
        let repo = tmp.path().join("repo");
        std::fs::create_dir_all(network.join("videos/intro")).unwrap();
        std::fs::write(network.join("videos/intro/=FD01"), b"first cut").unwrap();
        std::fs::write(network.join("videos/intro/=FD02"), b"final cut").unwrap();
        std::fs::write(network.join("videos/readme"), b"plain").unwrap();
        Dirs {
            _tmp: tmp,
            network,
            repo,
        }
    }

    async fn enumerate(session: &DirSession, prefix: &str, scope: EnumerationScope) -> Vec<Segment> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: ChildrenListener = Arc::new(move |_: &Name, children: &[Segment]| {
            sink.lock().unwrap().extend_from_slice(children);
        });
        session
            .register_interest(Interest::new(name(prefix), 1, scope), listener)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.cancel_interest(&name(prefix)).await.unwrap();
        let out = seen.lock().unwrap().clone();
        out
    }

    #[tokio::test]
    async fn test_enumerates_directory_entries() {
        let dirs = dirs();
        let session = DirNetwork::new(&dirs.network, &dirs.repo)
            .open_session()
            .await
            .unwrap();

        let children = enumerate(&session, "/videos", EnumerationScope::Any).await;
        assert_eq!(children, vec![Segment::from("intro"), Segment::from("readme")]);

        let versions = enumerate(&session, "/videos/intro", EnumerationScope::Any).await;
        assert_eq!(versions, vec![Segment::from("=FD01"), Segment::from("=FD02")]);
    }

    #[tokio::test]
    async fn test_versioned_read_then_store() {
        let dirs = dirs();
        let session = DirNetwork::new(&dirs.network, &dirs.repo)
            .open_session()
            .await
            .unwrap();

        let mut stream = session
            .open_read(&name("/videos/intro"), Addressing::Versioned)
            .await
            .unwrap();
        assert_eq!(stream.name(), &name("/videos/intro").child(Version(2).to_segment()));

        let mut sink = session
            .open_write(stream.name(), Addressing::Versioned)
            .await
            .unwrap();
        let mut buf = [0u8; 4];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n]).await.unwrap();
        }
        sink.finish().await.unwrap();
        stream.close().await.unwrap();

        let stored = std::fs::read(dirs.repo.join("videos/intro/=FD02")).unwrap();
        assert_eq!(stored, b"final cut");

        let local = enumerate(&session, "/videos/intro", EnumerationScope::Local).await;
        assert_eq!(local, vec![Segment::from("=FD02")]);
    }

    #[tokio::test]
    async fn test_aborted_write_leaves_nothing() {
        let dirs = dirs();
        let session = DirNetwork::new(&dirs.network, &dirs.repo)
            .open_session()
            .await
            .unwrap();

        let mut sink = session
            .open_write(&name("/videos/readme"), Addressing::Unversioned)
            .await
            .unwrap();
        sink.write_all(b"half").await.unwrap();
        sink.abort().await.unwrap();

        assert!(!dirs.repo.join("videos/readme").exists());
        assert!(!dirs.repo.join("videos/.readme.partial").exists());
    }

    #[tokio::test]
    async fn test_failed_finish_removes_partial_file() {
        let dirs = dirs();
        let session = DirNetwork::new(&dirs.network, &dirs.repo)
            .open_session()
            .await
            .unwrap();

        let mut sink = session
            .open_write(&name("/videos/readme"), Addressing::Unversioned)
            .await
            .unwrap();
        sink.write_all(b"whole").await.unwrap();
        // A non-empty directory at the destination makes the rename fail.
        std::fs::create_dir_all(dirs.repo.join("videos/readme/inner")).unwrap();

        assert!(sink.finish().await.is_err());
        assert!(!dirs.repo.join("videos/.readme.partial").exists());
        assert!(dirs.repo.join("videos/readme/inner").is_dir());
    }

    #[tokio::test]
    async fn test_missing_content_is_unresolved() {
        let dirs = dirs();
        let session = DirNetwork::new(&dirs.network, &dirs.repo)
            .open_session()
            .await
            .unwrap();

        let err = session
            .open_read(&name("/videos/missing"), Addressing::Versioned)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, NetError::Resolution { .. }));
    }

    #[tokio::test]
    async fn test_missing_network_root_refuses_session() {
        let tmp = TempDir::new().unwrap();
        let network = DirNetwork::new(tmp.path().join("absent"), tmp.path().join("repo"));
        assert!(matches!(
            network.open_session().await,
            Err(NetError::Connection(_))
        ));
    }
}
