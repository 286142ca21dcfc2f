//! Deadline bookkeeping for the monitor's repeating timer.
//!
//! The timer is a single `next_fire` deadline. The control loop waits on
//! `crossbeam_channel::at(deadline)`; rearming replaces the deadline in place,
//! so there is never more than one pending fire time per monitor.
//!
//! An armed timer whose next fire time is not representable as an `Instant`
//! keeps `next_fire = None` and simply never fires until it is rearmed.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct Schedule {
    interval: Duration,
    armed: bool,
    next_fire: Option<Instant>,
    stopped: bool,
}

impl Schedule {
    pub(crate) const fn new(interval: Duration) -> Self {
        Self {
            interval,
            armed: false,
            next_fire: None,
            stopped: false,
        }
    }

    pub(crate) const fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) const fn deadline(&self) -> Option<Instant> {
        self.next_fire
    }

    pub(crate) const fn is_armed(&self) -> bool {
        self.armed
    }

    pub(crate) const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Start ticking: first fire one interval after `now`.
    pub(crate) fn arm(&mut self, now: Instant) -> Option<Instant> {
        self.armed = true;
        self.next_fire = now.checked_add(self.interval);
        self.next_fire
    }

    /// Store a new interval. If armed, the next fire moves to `now + interval`.
    ///
    /// Returns true if the armed deadline was replaced.
    pub(crate) fn set_interval(&mut self, interval: Duration, now: Instant) -> bool {
        self.interval = interval;
        if self.armed {
            self.next_fire = now.checked_add(interval);
            true
        } else {
            false
        }
    }

    /// Consume a due deadline and schedule the following one.
    ///
    /// Returns false if nothing is due at `now` (the deadline was moved later
    /// or the timer is disarmed). Missed periods are dropped rather than
    /// replayed in a burst.
    pub(crate) fn fire(&mut self, now: Instant) -> bool {
        match self.next_fire {
            Some(due) if due <= now => {
                self.next_fire = match due.checked_add(self.interval) {
                    Some(next) if next > now => Some(next),
                    _ => now.checked_add(self.interval),
                };
                true
            }
            _ => false,
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
        self.next_fire = None;
    }

    /// Disarm permanently. Later `arm` calls are refused by the monitor.
    pub(crate) fn stop(&mut self) {
        self.disarm();
        self.stopped = true;
    }
}
