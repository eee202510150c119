//! The per-upload state machine shared between a single writer and any
//! number of tailing readers.

use std::time::Duration;

use tokio::sync::{Notify, RwLock};

use super::watchdog::Watchdog;

/// Terminal/non-terminal lifecycle state of an [`ActiveFile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    New,
    Aborted,
    Finished,
}

/// Tracks the declared length and the write frontier once a writer has
/// attached. `bytes_written` uses `-1` as the "writer not attached yet"
/// sentinel, matching the source design (§3 of the specification).
#[derive(Clone, Copy, Debug)]
pub(super) struct UploadState {
    pub total_bytes: u64,
    pub bytes_written: i64,
}

pub(super) struct Inner {
    pub state: State,
    pub upload: Option<UploadState>,
}

/// One in-flight (or just-finalized) upload reservation.
pub struct ActiveFile {
    pub name: String,
    #[allow(dead_code)]
    pub user_key: String,
    pub(super) inner: RwLock<Inner>,
    notify: Notify,
    watchdog: Watchdog,
}

/// Result of calling [`ActiveFile::finalize`].
pub(super) struct FinalizeOutcome {
    pub state: State,
    /// True iff this call performed the `New -> terminal` transition (i.e.
    /// no other caller raced ahead of it). Only the winner should remove the
    /// blob / registry entry.
    pub first: bool,
    /// Whether a blob writer had actually been attached (`bytes_written`
    /// reached `0`) at finalize time — i.e. whether a blob file exists on
    /// disk that needs removing on an `Aborted` outcome.
    pub had_writer: bool,
}

impl ActiveFile {
    pub fn new(name: String, user_key: String, idle_timeout: Duration, on_idle: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name,
            user_key,
            inner: RwLock::new(Inner {
                state: State::New,
                upload: None,
            }),
            notify: Notify::new(),
            watchdog: Watchdog::new(idle_timeout, on_idle),
        }
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Installs the upload record, failing if one is already attached.
    pub async fn install_upload(&self, total_bytes: u64) -> Result<(), ()> {
        let mut inner = self.inner.write().await;
        if inner.upload.is_some() {
            return Err(());
        }
        inner.upload = Some(UploadState {
            total_bytes,
            bytes_written: -1,
        });
        Ok(())
    }

    /// Marks the blob writer as attached (`bytes_written: -1 -> 0`) and
    /// wakes anyone blocked opening a tailing reader.
    pub async fn mark_writer_attached(&self) {
        {
            let mut inner = self.inner.write().await;
            if let Some(upload) = inner.upload.as_mut() {
                upload.bytes_written = 0;
            }
        }
        self.notify.notify_waiters();
    }

    /// Advances the write frontier and wakes waiting readers.
    pub async fn advance(&self, n: u64) {
        {
            let mut inner = self.inner.write().await;
            if let Some(upload) = inner.upload.as_mut() {
                upload.bytes_written += n as i64;
            }
        }
        self.notify.notify_waiters();
    }

    /// Idempotently transitions to a terminal state. Only the first caller
    /// to observe `State::New` performs the transition; later callers see
    /// `first: false` and must not repeat cleanup.
    pub(super) async fn finalize(&self) -> FinalizeOutcome {
        let (state, had_writer, first) = {
            let mut inner = self.inner.write().await;
            let had_writer = matches!(inner.upload, Some(UploadState { bytes_written, .. }) if bytes_written >= 0);
            if inner.state != State::New {
                (inner.state, had_writer, false)
            } else {
                let finished = matches!(
                    inner.upload,
                    Some(UploadState { total_bytes, bytes_written })
                        if bytes_written >= 0 && bytes_written as u64 == total_bytes
                );
                inner.state = if finished { State::Finished } else { State::Aborted };
                (inner.state, had_writer, true)
            }
        };
        self.notify.notify_waiters();
        FinalizeOutcome {
            state,
            first,
            had_writer,
        }
    }

    /// Blocks until `check` returns `Some`, re-evaluating it every time
    /// `notify_waiters` fires. Uses the documented race-free pattern for
    /// `tokio::sync::Notify`: the `Notified` future is created and enabled
    /// *before* the predicate is (re-)checked, so a notification delivered
    /// between the check and the await is never lost.
    pub(super) async fn wait_until<T>(&self, mut check: impl FnMut(&Inner) -> Option<T>) -> T {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let inner = self.inner.read().await;
                if let Some(v) = check(&inner) {
                    return v;
                }
            }

            notified.await;
        }
    }

    pub async fn snapshot_state(&self) -> State {
        self.inner.read().await.state
    }
}
