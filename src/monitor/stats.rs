//! Dispatch counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time snapshot of a monitor's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    /// Timer ticks observed by the control loop, with or without a check installed.
    pub ticks: u64,
    /// Check invocations handed to a dispatch thread.
    pub checks_dispatched: u64,
    /// Messages taken off the notification source.
    pub notifications_received: u64,
    /// Messages handed to a dispatch thread (unset handler drops them).
    pub notifications_dispatched: u64,
    /// Panics caught inside dispatched invocations.
    pub panics_caught: u64,
    /// Dispatch threads the OS refused to spawn.
    pub spawn_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) ticks: AtomicU64,
    pub(crate) checks_dispatched: AtomicU64,
    pub(crate) notifications_received: AtomicU64,
    pub(crate) notifications_dispatched: AtomicU64,
    pub(crate) panics_caught: AtomicU64,
    pub(crate) spawn_failures: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MonitorStats {
        MonitorStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            checks_dispatched: self.checks_dispatched.load(Ordering::Relaxed),
            notifications_received: self.notifications_received.load(Ordering::Relaxed),
            notifications_dispatched: self.notifications_dispatched.load(Ordering::Relaxed),
            panics_caught: self.panics_caught.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
        }
    }
}
