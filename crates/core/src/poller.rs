//! Bounded-retry retrieval of results that are computed out-of-band.
//!
//! "Not ready yet" and transient accessor failures are both normal during
//! polling and are not distinguished; only exhausting the attempt budget is
//! a terminal failure, and it stays distinguishable from success.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_500);

#[derive(Debug, PartialEq)]
pub enum PollOutcome<T> {
    Ready(T),
    Exhausted,
    Cancelled,
}

impl<T> PollOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            PollOutcome::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Flips the paired [`CancelToken`]. Dropping the handle cancels too, so a
/// poll owned by a task that goes away stops scheduling attempts.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that never fires, for call sites with no teardown path.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        match &self.rx {
            Some(rx) => *rx.borrow() || rx.has_changed().is_err(),
            None => false,
        }
    }

    async fn cancelled(&mut self) {
        match &mut self.rx {
            Some(rx) => loop {
                if *rx.borrow() {
                    return;
                }
                // A dropped handle closes the channel; treat that as
                // cancellation.
                if rx.changed().await.is_err() {
                    return;
                }
            },
            None => std::future::pending().await,
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx: Some(rx) })
}

#[derive(Debug, Clone, Copy)]
pub struct Poller {
    max_attempts: u32,
    interval: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Poller {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Calls `accessor` until it yields a value, the attempt budget runs
    /// out, or the token cancels. `Ok(None)` means not ready; `Err` is
    /// treated the same way since transient failures are expected while the
    /// result is being computed. Never calls the accessor more than
    /// `max_attempts` times, and never after cancellation.
    pub async fn poll<T, F, Fut>(&self, mut cancel: CancelToken, mut accessor: F) -> PollOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return PollOutcome::Cancelled;
            }
            match accessor().await {
                Ok(Some(value)) => {
                    tracing::debug!(attempt, "poll result ready");
                    return PollOutcome::Ready(value);
                }
                Ok(None) => {
                    tracing::debug!(attempt, "poll result not ready yet");
                }
                Err(e) => {
                    tracing::debug!(attempt, "poll attempt failed, treating as not ready: {e:#}");
                }
            }
            if attempt < self.max_attempts {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = cancel.cancelled() => return PollOutcome::Cancelled,
                }
            }
        }
        PollOutcome::Exhausted
    }
}
