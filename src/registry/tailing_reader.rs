//! A read/seek cursor over a blob that may still be growing.

use std::io::SeekFrom;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::active_file::{ActiveFile, State};
use super::errors::TailingReadError;
use crate::blobstore::BlobReader;

enum ReadGate {
    Eof,
    Aborted,
    Ready,
}

/// Tails a single named blob, blocking `read` past the current write
/// frontier instead of returning EOF, and returning [`TailingReadError::Aborted`]
/// once the upload it follows dies.
pub struct TailingReader {
    active: Arc<ActiveFile>,
    blob: BlobReader,
    position: u64,
}

impl TailingReader {
    pub(super) fn new(active: Arc<ActiveFile>, blob: BlobReader) -> Self {
        Self {
            active,
            blob,
            position: 0,
        }
    }

    pub fn content_type(&self) -> &str {
        self.blob.content_type()
    }

    /// The declared total size of the file (may exceed what has actually
    /// been written so far).
    pub async fn size(&self) -> u64 {
        let inner = self.active.inner.read().await;
        inner.upload.map(|u| u.total_bytes).unwrap_or(0)
    }

    pub async fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let total = self.size().await;
        let new_pos = match pos {
            SeekFrom::Start(n) => n,
            SeekFrom::End(delta) => (total as i64 + delta).max(0) as u64,
            SeekFrom::Current(delta) => (self.position as i64 + delta).max(0) as u64,
        };
        self.blob.seek(SeekFrom::Start(new_pos)).await?;
        self.position = new_pos;
        Ok(new_pos)
    }

    /// Reads the next chunk, blocking until either more bytes have been
    /// written past the current position or the upload reaches a terminal
    /// state.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TailingReadError> {
        loop {
            let position = self.position;
            let gate = self
                .active
                .wait_until(|inner| {
                    if inner.state == State::Aborted {
                        return Some(ReadGate::Aborted);
                    }
                    let total = inner.upload.map(|u| u.total_bytes).unwrap_or(0);
                    if position >= total {
                        return Some(ReadGate::Eof);
                    }
                    let written = inner
                        .upload
                        .map(|u| u.bytes_written.max(0) as u64)
                        .unwrap_or(0);
                    if position < written {
                        return Some(ReadGate::Ready);
                    }
                    None
                })
                .await;

            match gate {
                ReadGate::Eof => return Ok(0),
                ReadGate::Aborted => return Err(TailingReadError::Aborted),
                ReadGate::Ready => {
                    let n = self.blob.read(buf).await.map_err(TailingReadError::Io)?;
                    if n == 0 {
                        // Blob-level EOF while more bytes are expected: we
                        // raced the writer's own flush. Re-check the
                        // predicate rather than surfacing a false EOF.
                        continue;
                    }
                    self.position += n as u64;
                    return Ok(n);
                }
            }
        }
    }

    /// The current cursor position (bytes from the start of the blob).
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Like [`TailingReader::read`], but maps [`TailingReadError::Aborted`]
    /// onto a plain [`std::io::Error`] for callers (the HTTP response body
    /// stream) that only deal in I/O errors.
    pub async fn read_io(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read(buf).await.map_err(|e| match e {
            TailingReadError::Aborted => {
                std::io::Error::new(std::io::ErrorKind::Other, "UploadAborted")
            }
            TailingReadError::Io(e) => e,
        })
    }

    pub async fn close(self) {
        drop(self);
    }
}
