//! The active-file registry: the `name -> ActiveFile` map, and the three
//! operations the HTTP layer drives it through (§4.1).
//!
//! Grounded on `src/backbone/backbone.rs` (`Backbone`'s `Arc<RwLock<Inner>>`
//! map-of-records plus command dispatch) and `src/backbone/file_writer_guard.rs`
//! (the "any exit path finalizes exactly once" pattern, generalized here into
//! [`Registry::finalize_by_name`]). The upload chunk-read loop (periodic
//! watchdog reset, write, progress broadcast) is grounded on
//! `bins/server/src/handlers/yeet.rs`'s `do_yeet` body-streaming loop.

mod active_file;
mod errors;
mod tailing_reader;
mod watchdog;

pub use active_file::State;
pub use errors::{TailingReadError, UploadError};
pub use tailing_reader::TailingReader;
pub use watchdog::Watchdog;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use active_file::ActiveFile;
use crate::blobstore::BlobStore;
use crate::identifier;

/// Default per-chunk read size for the upload loop (§4.1 step 5).
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Default idle timeout before an in-flight upload with no byte progress is
/// aborted (§4.1: "10 seconds").
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// The active-file registry. Lives for the process lifetime (§3).
pub struct Registry<S> {
    blob_store: Arc<S>,
    active: RwLock<HashMap<String, Arc<ActiveFile>>>,
    idle_timeout: Duration,
    chunk_size: usize,
}

impl<S: BlobStore> Registry<S> {
    pub fn new(blob_store: S, idle_timeout: Duration) -> Arc<Self> {
        Self::with_chunk_size(blob_store, idle_timeout, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(blob_store: S, idle_timeout: Duration, chunk_size: usize) -> Arc<Self> {
        Arc::new(Self {
            blob_store: Arc::new(blob_store),
            active: RwLock::new(HashMap::new()),
            idle_timeout,
            chunk_size,
        })
    }

    /// Mints a fresh reservation and starts its watchdog. Retries on a name
    /// collision (§4.1).
    pub async fn prepare_upload(self: &Arc<Self>, extension: &str, user_key: String) -> String {
        loop {
            let name = identifier::generate_file_name(extension);

            let mut map = self.active.write().await;
            if map.contains_key(&name) {
                continue;
            }

            let registry = self.clone();
            let finalize_name = name.clone();
            let active = Arc::new(ActiveFile::new(
                name.clone(),
                user_key.clone(),
                self.idle_timeout,
                move || {
                    tokio::spawn(async move {
                        debug!(name = %finalize_name, "idle watchdog fired, finalizing");
                        registry.finalize_by_name(&finalize_name).await;
                    });
                },
            ));
            map.insert(name.clone(), active);
            return name;
        }
    }

    /// Consumes an upload stream for a previously-minted `name` (§4.1).
    ///
    /// `user_key` is threaded through but never interpreted — see the
    /// specification's open question on authentication.
    pub async fn upload<R>(
        self: &Arc<Self>,
        name: &str,
        mut body: R,
        declared_length: u64,
        _user_key: String,
    ) -> Result<(), UploadError>
    where
        R: AsyncRead + Unpin,
    {
        let active = {
            let map = self.active.read().await;
            map.get(name).cloned().ok_or(UploadError::NoPreparedUpload)?
        };

        active
            .install_upload(declared_length)
            .await
            .map_err(|_| UploadError::AlreadyUploading)?;

        let mut writer = match self.blob_store.get_writer(name).await {
            Ok(writer) => writer,
            Err(e) => {
                active.watchdog().cancel();
                self.finalize_by_name(name).await;
                return Err(UploadError::Io(e));
            }
        };

        // The writer-attached signal (§4.1 step 4): bytes_written -1 -> 0,
        // unblocking any reader already waiting to open a tailing reader.
        active.mark_writer_attached().await;

        let mut buf = vec![0u8; self.chunk_size];
        let mut total_written: u64 = 0;

        let stream_result = loop {
            match body.read(&mut buf).await {
                Ok(0) => break Ok(()),
                Ok(n) => {
                    active.watchdog().reset();

                    if let Err(e) = writer.write_all(&buf[..n]).await {
                        break Err(e);
                    }
                    // Flush before reporting progress: readers must never
                    // observe bytes_written advance past bytes that are not
                    // yet durable (§5 ordering guarantee).
                    if let Err(e) = writer.flush().await {
                        break Err(e);
                    }

                    total_written += n as u64;
                    active.advance(n as u64).await;
                    trace!(name, total_written, declared_length, "progress");
                }
                Err(e) => break Err(e),
            }
        };

        drop(writer);
        active.watchdog().cancel();

        if let Err(e) = stream_result {
            warn!(name, error = %e, "upload stream failed, aborting");
            self.finalize_by_name(name).await;
            return Err(UploadError::Io(e));
        }

        if total_written != declared_length {
            warn!(
                name,
                declared_length, total_written, "declared length mismatch, aborting"
            );
            self.finalize_by_name(name).await;
            return Err(UploadError::LengthMismatch {
                declared: declared_length,
                written: total_written,
            });
        }

        self.finalize_by_name(name).await;
        Ok(())
    }

    /// Returns a tailing reader over an in-flight upload, or `None` if no
    /// active entry exists under `name` (§4.1's `GetReader`). The caller
    /// (the HTTP layer's façade) is expected to fall back to the blob store
    /// directly for finished files.
    pub async fn get_reader(&self, name: &str) -> Option<TailingReader> {
        let active = {
            let map = self.active.read().await;
            map.get(name).cloned()?
        };

        let writer_attached = active
            .wait_until(|inner| {
                if inner.state == State::Aborted {
                    return Some(false);
                }
                match inner.upload {
                    Some(upload) if upload.bytes_written >= 0 => Some(true),
                    _ => None,
                }
            })
            .await;

        if !writer_attached {
            return None;
        }

        let blob = self.blob_store.get_reader(name).await.ok()?;
        Some(TailingReader::new(active, blob))
    }

    /// `true` iff `name` currently has a live (non-terminal) registry entry.
    /// Exposed for the mint endpoint's collision check and for tests.
    pub async fn is_active(&self, name: &str) -> bool {
        self.active.read().await.contains_key(name)
    }

    /// Direct access to the backing blob store, for the download handler's
    /// fallback to finished files once an entry has left the registry (§2's
    /// "glue" façade).
    pub fn blob_store(&self) -> &S {
        &self.blob_store
    }

    /// The single idempotent finalize step (§4.1.1): decide
    /// `Finished`/`Aborted`, wake all waiters, remove the registry entry,
    /// and — on the winning call only — remove the blob if the outcome was
    /// `Aborted` and a writer had actually attached.
    async fn finalize_by_name(&self, name: &str) {
        let active = {
            let map = self.active.read().await;
            map.get(name).cloned()
        };
        let Some(active) = active else {
            return;
        };

        let outcome = active.finalize().await;
        if !outcome.first {
            return;
        }

        if outcome.state == State::Aborted && outcome.had_writer {
            if let Err(e) = self.blob_store.remove_file(name).await {
                warn!(name, error = %e, "failed to remove blob for aborted upload");
            }
        }

        let mut map = self.active.write().await;
        map.remove(name);
        debug!(name, state = ?outcome.state, "finalized and removed from registry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobstore::DiskBlobStore;
    use bytes::Bytes;
    use futures::StreamExt;
    use std::io::Cursor;
    use tempfile::TempDir;
    use tokio_util::io::StreamReader;

    fn registry_with(idle: Duration) -> (Arc<Registry<DiskBlobStore>>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskBlobStore::new(dir.path()).unwrap();
        (Registry::new(store, idle), dir)
    }

    #[tokio::test]
    async fn prepare_upload_then_full_upload_finishes_and_is_readable() {
        let (registry, _dir) = registry_with(Duration::from_secs(10));
        let name = registry.prepare_upload("png", String::new()).await;
        assert!(name.ends_with(".png"));
        assert!(registry.is_active(&name).await);

        let body = Cursor::new(b"hello".to_vec());
        registry
            .upload(&name, body, 5, String::new())
            .await
            .unwrap();

        // Finished uploads are removed from the active registry.
        assert!(!registry.is_active(&name).await);
        assert!(registry.get_reader(&name).await.is_none());
    }

    #[tokio::test]
    async fn upload_to_unknown_name_fails() {
        let (registry, _dir) = registry_with(Duration::from_secs(10));
        let body = Cursor::new(b"hello".to_vec());
        let err = registry
            .upload("does-not-exist", body, 5, String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NoPreparedUpload));
    }

    #[tokio::test]
    async fn double_upload_is_rejected() {
        let (registry, _dir) = registry_with(Duration::from_secs(10));
        let name = registry.prepare_upload("", String::new()).await;

        // Install a writer "by hand" to simulate a concurrent first upload
        // that hasn't finished yet, then attempt a second.
        let map = registry.active.read().await;
        let active = map.get(&name).cloned().unwrap();
        drop(map);
        active.install_upload(5).await.unwrap();

        let body = Cursor::new(b"hello".to_vec());
        let err = registry
            .upload(&name, body, 5, String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::AlreadyUploading));
    }

    #[tokio::test]
    async fn length_mismatch_aborts_and_removes_blob() {
        let (registry, _dir) = registry_with(Duration::from_secs(10));
        let name = registry.prepare_upload("", String::new()).await;

        let body = Cursor::new(b"hello".to_vec());
        // Declare more bytes than are actually in the stream.
        let err = registry
            .upload(&name, body, 11, String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::LengthMismatch { .. }));
        assert!(!registry.blob_store.exists(&name).await);
        assert!(!registry.is_active(&name).await);
    }

    #[tokio::test]
    async fn idle_timeout_aborts_prepared_but_never_uploaded_entry() {
        let (registry, _dir) = registry_with(Duration::from_millis(30));
        let name = registry.prepare_upload("png", String::new()).await;
        assert!(registry.is_active(&name).await);

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!registry.is_active(&name).await);
        assert!(registry.get_reader(&name).await.is_none());
    }

    /// Drives `body` (a byte stream spread over time) through a slow
    /// paced `StreamReader`, the same adapter `upload.rs` feeds the
    /// registry from an axum request body (§5: suspension on the writer's
    /// flush, not a single buffered read).
    fn paced_body(
        chunks: Vec<std::io::Result<Bytes>>,
        delay: Duration,
    ) -> StreamReader<impl futures::Stream<Item = std::io::Result<Bytes>>, Bytes> {
        let stream = futures::stream::iter(chunks).then(move |chunk| async move {
            tokio::time::sleep(delay).await;
            chunk
        });
        StreamReader::new(stream)
    }

    #[tokio::test]
    async fn get_reader_blocks_until_writer_attaches_then_streams() {
        let (registry, _dir) = registry_with(Duration::from_secs(10));
        let name = registry.prepare_upload("", String::new()).await;

        let reader_registry = registry.clone();
        let reader_name = name.clone();
        let reader_task = tokio::spawn(async move { reader_registry.get_reader(&reader_name).await });

        // Upload does not even start until after the reader is already
        // blocked inside `OpenReader`'s wait loop (§4.2 step 3).
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reader_task.is_finished());

        let body = Cursor::new(b"data".to_vec());
        registry.upload(&name, body, 4, String::new()).await.unwrap();

        let reader = reader_task.await.unwrap();
        assert!(reader.is_some(), "reader should unblock once the writer attaches");
    }

    #[tokio::test]
    async fn tailing_read_follows_a_slow_upload_to_completion() {
        let (registry, _dir) = registry_with(Duration::from_secs(10));
        let name = registry.prepare_upload("", String::new()).await;

        let body = paced_body(
            vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))],
            Duration::from_millis(30),
        );

        let upload_registry = registry.clone();
        let upload_name = name.clone();
        let upload_task =
            tokio::spawn(async move { upload_registry.upload(&upload_name, body, 11, String::new()).await });

        // Give the writer a moment to attach before opening the tailing reader.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut reader = registry
            .get_reader(&name)
            .await
            .expect("upload is active, reader should be available");

        let mut collected = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = reader.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..n]);
        }

        assert_eq!(collected, b"hello world");
        upload_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reader_seek_past_frontier_blocks_until_writer_catches_up() {
        let (registry, _dir) = registry_with(Duration::from_secs(10));
        let name = registry.prepare_upload("", String::new()).await;

        let body = paced_body(
            vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))],
            Duration::from_millis(40),
        );

        let upload_registry = registry.clone();
        let upload_name = name.clone();
        tokio::spawn(async move {
            upload_registry
                .upload(&upload_name, body, 11, String::new())
                .await
                .unwrap();
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut reader = registry.get_reader(&name).await.unwrap();

        // Seeking past the current write frontier is legal (§4.2); the
        // subsequent read simply blocks until the frontier advances past it.
        reader.seek(std::io::SeekFrom::Start(8)).await.unwrap();

        let mut buf = [0u8; 3];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf, b"rld");
    }

    #[tokio::test]
    async fn aborted_upload_wakes_a_blocked_reader_with_an_error() {
        let (registry, _dir) = registry_with(Duration::from_secs(10));
        let name = registry.prepare_upload("", String::new()).await;

        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"hi")),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom")),
        ];
        let body = paced_body(chunks, Duration::from_millis(20));

        // Declare far more than will ever be written so EOF-by-length never
        // short-circuits the abort path below.
        let upload_registry = registry.clone();
        let upload_name = name.clone();
        tokio::spawn(async move {
            let _ = upload_registry.upload(&upload_name, body, 100, String::new()).await;
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut reader = registry.get_reader(&name).await.unwrap();

        let mut buf = [0u8; 2];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hi");

        let err = reader.read(&mut buf).await.unwrap_err();
        assert!(matches!(err, TailingReadError::Aborted));
        assert!(!registry.is_active(&name).await);
    }
}
