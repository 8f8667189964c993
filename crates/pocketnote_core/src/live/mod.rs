//! Scoped live subscriptions.
//!
//! # Responsibility
//! - Deliver full snapshots to consumers over a channel.
//! - Release the producer-side registration when the consumer drops its
//!   handle.
//!
//! # Invariants
//! - Every push carries a complete value, never a delta.
//! - Dropping a [`Subscription`] runs its release hook exactly once.

use std::fmt::{Debug, Formatter};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Consumer side of a live observation.
pub struct Subscription<T> {
    rx: Receiver<T>,
    _release: ReleaseOnDrop,
}

impl<T> Subscription<T> {
    /// Builds a subscription whose `release` hook runs on drop.
    pub fn new(rx: Receiver<T>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            rx,
            _release: ReleaseOnDrop(Some(Box::new(release))),
        }
    }

    /// Blocks until the next snapshot; `None` once the producer is gone.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Waits up to `timeout` for the next snapshot.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Returns a queued snapshot without blocking.
    pub fn try_recv(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Drains the queue and returns only the newest snapshot.
    pub fn latest(&self) -> Option<T> {
        let mut newest = None;
        while let Some(value) = self.try_recv() {
            newest = Some(value);
        }
        newest
    }
}

impl<T> Debug for Subscription<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

struct ReleaseOnDrop(Option<Box<dyn FnOnce() + Send>>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}
