//! The byte-level blob store: open/create/read/write/remove/stat a named
//! blob on disk. This is the external collaborator specified only at its
//! interface (§6) — the core engine in `crate::registry` never touches the
//! filesystem directly, only through this trait.
//!
//! Grounded on `examples/original_source/server/diskfilestore.go` and
//! `server/filestore.go` (the `FileStore`/`FileReader`/`FileWriter`
//! interface shape), tightened per the specification: the base directory
//! must exist at startup (fatal error otherwise), not be auto-created as
//! the original does.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

use crate::mime_types::content_type_for_filename;

/// Abstraction over where uploaded bytes ultimately live.
///
/// Every method here is specified only at this boundary (§6): the registry
/// depends solely on this trait, never on `DiskBlobStore` directly, so a
/// different backing store could be substituted without touching the
/// streaming engine.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Opens a read-seek cursor over a finished blob.
    async fn get_reader(&self, name: &str) -> io::Result<BlobReader>;

    /// Opens an append-only writer for a new blob. Must flush bytes so they
    /// are visible to concurrent readers before `write` returns (§5).
    async fn get_writer(&self, name: &str) -> io::Result<BlobWriter>;

    /// Deletes a blob. Used both for aborted uploads (§4.1.1) and, in
    /// principle, for any future retention policy.
    async fn remove_file(&self, name: &str) -> io::Result<()>;

    /// `true` iff a finished blob exists under `name`. Used by the façade
    /// (§2 "glue") to decide whether a `GetReader` miss on the active-file
    /// registry should 404 or fall through to this store.
    async fn exists(&self, name: &str) -> bool;
}

/// Disk-backed implementation. The base directory must already exist;
/// `DiskBlobStore::new` fails otherwise rather than creating it, per the
/// specification's explicit "no auto-creation" requirement.
#[derive(Clone)]
pub struct DiskBlobStore {
    base_dir: PathBuf,
}

impl DiskBlobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let base_dir = base_dir.into();
        let metadata = std::fs::metadata(&base_dir)?;
        if !metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", base_dir.display()),
            ));
        }
        Ok(Self { base_dir })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn get_reader(&self, name: &str) -> io::Result<BlobReader> {
        let path = self.path_for(name);
        let file = File::open(&path).await?;
        let metadata = file.metadata().await?;
        Ok(BlobReader {
            file,
            content_type: content_type_for_filename(name).to_string(),
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }

    async fn get_writer(&self, name: &str) -> io::Result<BlobWriter> {
        let path = self.path_for(name);
        let file = File::create(&path).await?;
        Ok(BlobWriter { file, path })
    }

    async fn remove_file(&self, name: &str) -> io::Result<()> {
        let path = self.path_for(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, name: &str) -> bool {
        tokio::fs::metadata(self.path_for(name)).await.is_ok()
    }
}

/// A read-seek-close cursor over a blob. Used directly for finished files,
/// and wrapped by [`crate::registry::TailingReader`] while an upload is
/// still in flight.
pub struct BlobReader {
    file: File,
    content_type: String,
    len: u64,
    modified: Option<std::time::SystemTime>,
}

impl BlobReader {
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The blob's on-disk length at the time it was opened (finished files
    /// only; a tailing read uses the declared `total_bytes` instead, per
    /// §4.2).
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn modified(&self) -> Option<std::time::SystemTime> {
        self.modified
    }
}

impl AsyncRead for BlobReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

impl AsyncSeek for BlobReader {
    fn start_seek(mut self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        Pin::new(&mut self.file).start_seek(position)
    }

    fn poll_complete(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<u64>> {
        Pin::new(&mut self.file).poll_complete(cx)
    }
}

/// An append-only write-close cursor. `write` (via [`tokio::io::AsyncWriteExt`])
/// must flush before returning so that bytes are immediately visible to
/// concurrent readers (§5 ordering guarantee).
pub struct BlobWriter {
    file: File,
    path: PathBuf,
}

impl BlobWriter {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsyncWrite for BlobWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        Pin::new(&mut self.file).poll_write(cx, buf)
    }

    fn poll_flush(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn missing_base_dir_fails_fast() {
        let err = DiskBlobStore::new("/nonexistent/does/not/exist").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn write_then_read_roundtrips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskBlobStore::new(dir.path()).unwrap();

        {
            let mut writer = store.get_writer("sample.txt").await.unwrap();
            writer.write_all(b"hello world").await.unwrap();
            writer.flush().await.unwrap();
        }

        assert!(store.exists("sample.txt").await);

        let mut reader = store.get_reader("sample.txt").await.unwrap();
        assert_eq!(reader.content_type(), "text/plain; charset=utf-8");
        let mut buf = String::new();
        reader.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "hello world");
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskBlobStore::new(dir.path()).unwrap();
        store.remove_file("never-existed").await.unwrap();
    }
}
