//! Swappable behaviour hooks and fire-and-forget dispatch.
//!
//! Hooks sit behind an `RwLock<Option<Arc<..>>>`. Dispatch clones the `Arc`
//! under a read lock and invokes it on its own thread, so swapping a hook while
//! the monitor runs only affects later dispatches.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;

use tracing::error;

use super::cancel::CancelToken;
use super::stats::Counters;

/// Periodic check routine. Receives the monitor's cancellation token.
pub type CheckFn = dyn Fn(&CancelToken) + Send + Sync + 'static;

/// Notification handler. Receives one message by value.
pub type NotifyFn<M> = dyn Fn(M) + Send + Sync + 'static;

pub(crate) struct Hook<F: ?Sized> {
    slot: RwLock<Option<Arc<F>>>,
}

impl<F: ?Sized> Hook<F> {
    pub(crate) const fn empty() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    pub(crate) fn set(&self, hook: Arc<F>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    pub(crate) fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn current(&self) -> Option<Arc<F>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone)
    }

    pub(crate) fn is_set(&self) -> bool {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl<F: ?Sized> std::fmt::Debug for Hook<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook").field("set", &self.is_set()).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchKind {
    Check,
    Notification,
}

impl DispatchKind {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Notification => "notify",
        }
    }
}

/// Spawns one detached thread per dispatched invocation.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    thread_name: String,
    catch_panics: bool,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub(crate) fn new(thread_name: String, catch_panics: bool, counters: Arc<Counters>) -> Self {
        Self {
            thread_name,
            catch_panics,
            counters,
        }
    }

    /// Hand `job` to a new thread. Returns false if the thread could not be spawned.
    pub(crate) fn dispatch<F>(&self, kind: DispatchKind, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let counter = match kind {
            DispatchKind::Check => &self.counters.checks_dispatched,
            DispatchKind::Notification => &self.counters.notifications_dispatched,
        };
        Counters::bump(counter);

        let counters = Arc::clone(&self.counters);
        let catch_panics = self.catch_panics;
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.thread_name, kind.as_str()))
            .spawn(move || {
                if catch_panics {
                    run_isolated(kind, job, &counters);
                } else {
                    job();
                }
            });

        match spawned {
            // Detached: the monitor never joins dispatched work.
            Ok(_handle) => true,
            Err(err) => {
                counter.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
                Counters::bump(&self.counters.spawn_failures);
                error!(kind = kind.as_str(), error = %err, "failed to spawn dispatch thread");
                false
            }
        }
    }
}

fn run_isolated<F: FnOnce()>(kind: DispatchKind, job: F, counters: &Counters) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        Counters::bump(&counters.panics_caught);
        error!(
            kind = kind.as_str(),
            panic = panic_message(payload.as_ref()),
            "dispatched invocation panicked"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
