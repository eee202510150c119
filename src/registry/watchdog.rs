//! A one-shot, resettable idle timer.
//!
//! Mirrors the original service's timeout goroutine: a single control loop
//! races a sleep against a stream of reset/cancel requests, and once it has
//! fired or been cancelled it never fires again. See
//! `examples/original_source/server/timeout/timeout.go` for the source this
//! is translated from.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Armed,
    Fired,
    Cancelled,
}

enum Signal {
    Reset,
    Cancel,
}

/// Handle to a running idle-timeout task.
///
/// Cloning a [`Watchdog`] gives another handle to the *same* underlying
/// timer; `reset`/`cancel` from any clone observe and mutate shared phase
/// state.
#[derive(Clone)]
pub struct Watchdog {
    phase: Arc<Mutex<Phase>>,
    tx: mpsc::UnboundedSender<Signal>,
}

impl Watchdog {
    /// Arms a new watchdog. `on_fire` runs on the watchdog's own task,
    /// exactly once, if `duration` elapses without an intervening `reset`
    /// or `cancel`.
    pub fn new<F>(duration: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let phase = Arc::new(Mutex::new(Phase::Armed));
        let task_phase = phase.clone();

        tokio::spawn(async move {
            let deadline = Instant::now() + duration;
            let timer = sleep(duration);
            tokio::pin!(timer);
            let mut deadline = deadline;

            loop {
                tokio::select! {
                    _ = &mut timer => {
                        let mut p = task_phase.lock().unwrap();
                        if *p != Phase::Armed {
                            return;
                        }
                        *p = Phase::Fired;
                        drop(p);
                        on_fire();
                        return;
                    }
                    signal = rx.recv() => {
                        match signal {
                            Some(Signal::Reset) => {
                                let p = task_phase.lock().unwrap();
                                if *p != Phase::Armed {
                                    return;
                                }
                                drop(p);
                                deadline = Instant::now() + duration;
                                timer.as_mut().reset(deadline);
                            }
                            Some(Signal::Cancel) | None => {
                                let mut p = task_phase.lock().unwrap();
                                if *p == Phase::Armed {
                                    *p = Phase::Cancelled;
                                }
                                return;
                            }
                        }
                    }
                }
            }
        });

        Self { phase, tx }
    }

    /// Restarts the countdown if still armed. Returns whether it was armed
    /// at the time of the call.
    pub fn reset(&self) -> bool {
        let p = self.phase.lock().unwrap();
        if *p != Phase::Armed {
            return false;
        }
        drop(p);
        self.tx.send(Signal::Reset).is_ok()
    }

    /// Cancels the watchdog without invoking `on_fire`. Returns whether it
    /// was armed at the time of the call.
    pub fn cancel(&self) -> bool {
        let mut p = self.phase.lock().unwrap();
        if *p != Phase::Armed {
            return false;
        }
        *p = Phase::Cancelled;
        drop(p);
        self.tx.send(Signal::Cancel).ok();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn fires_after_duration_with_no_resets() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let _wd = Watchdog::new(Duration::from_millis(30), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reset_postpones_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let wd = Watchdog::new(Duration::from_millis(40), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(wd.reset());
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(wd.reset());
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_prevents_fire_and_is_terminal() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let wd = Watchdog::new(Duration::from_millis(20), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(wd.cancel());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        assert!(!wd.cancel());
        assert!(!wd.reset());
    }

    #[tokio::test]
    async fn post_fire_controls_return_false() {
        let wd = Watchdog::new(Duration::from_millis(10), || {});
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!wd.reset());
        assert!(!wd.cancel());
    }
}
