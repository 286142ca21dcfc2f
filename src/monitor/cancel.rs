//! Cooperative cancellation signal.
//!
//! A `CancelToken` is a one-shot broadcast flag. Every clone observes the same
//! state. Besides polling, a token exposes a `crossbeam_channel::Receiver` that
//! disconnects on cancellation, so long-running work can wait on it inside a
//! `select!` alongside its own channels.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    // Dropped on cancel; nothing is ever sent.
    tx: Mutex<Option<Sender<Infallible>>>,
    rx: Receiver<Infallible>,
}

/// Cloneable handle to a shared cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = bounded::<Infallible>(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                tx: Mutex::new(Some(tx)),
                rx,
            }),
        }
    }

    /// Signal cancellation to every clone of this token.
    ///
    /// Idempotent. Returns true if this call performed the transition.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let sender = match self.inner.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);
        true
    }

    /// Returns true once `cancel` has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Receiver that becomes disconnected when the token is cancelled.
    ///
    /// Use with `crossbeam_channel::select!`: a `recv(token.receiver())` arm
    /// fires with `Err(RecvError)` on cancellation.
    #[must_use]
    pub fn receiver(&self) -> &Receiver<Infallible> {
        &self.inner.rx
    }

    /// Block until cancelled.
    pub fn wait(&self) {
        // Only ever returns Err(Disconnected).
        let _ = self.inner.rx.recv();
    }

    /// Block until cancelled or `timeout` elapses.
    ///
    /// Returns true if the token was cancelled, false on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            Ok(never) => match never {},
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
