//! The monitor control loop.
//!
//! `Monitor::run` blocks the calling thread and multiplexes four sources with
//! `crossbeam_channel::select!`: the notification receiver, the timer deadline,
//! an internal wake channel (used when the deadline is moved earlier), and the
//! cancellation token. Every check and notification is handed to its own
//! thread, so the loop never waits on user code.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{at, bounded, never, select, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::error::{MonitorError, MonitorResult};

use super::cancel::CancelToken;
use super::config::{duration_ms, validate_interval, MonitorConfig};
use super::hooks::{CheckFn, DispatchKind, Dispatcher, Hook, NotifyFn};
use super::schedule::Schedule;
use super::stats::{Counters, MonitorStats};

/// Why `Monitor::run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Every sender of the notification source was dropped.
    SourceClosed,
    /// `stop` was called or the cancellation token was cancelled.
    Cancelled,
}

/// Periodic check loop combined with a notification consumer.
///
/// A monitor is shared by reference (typically `Arc<Monitor<M>>`): one thread
/// calls [`run`](Self::run) while others call [`stop`](Self::stop),
/// [`set_interval`](Self::set_interval) or swap hooks. Hooks may be replaced at
/// any time; a replacement applies to dispatches that start after it.
///
/// Dispatched invocations are never awaited. Checks longer than the interval
/// overlap, and completion order across invocations is unspecified. Callers
/// that need in-flight work to finish after `stop` must wait for it
/// themselves, e.g. by having checks return once the token is cancelled.
pub struct Monitor<M> {
    notifications: Receiver<M>,
    schedule: Mutex<Schedule>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    cancel: CancelToken,
    check: Hook<CheckFn>,
    handler: Hook<NotifyFn<M>>,
    dispatcher: Dispatcher,
    running: AtomicBool,
    counters: Arc<Counters>,
}

impl<M: Send + 'static> Monitor<M> {
    /// Create a monitor with the default one-second interval.
    #[must_use]
    pub fn new(notifications: Receiver<M>) -> Self {
        Self::build(notifications, MonitorConfig::default())
    }

    /// Create a monitor from a validated configuration.
    pub fn with_config(notifications: Receiver<M>, config: MonitorConfig) -> MonitorResult<Self> {
        config.validate()?;
        Ok(Self::build(notifications, config))
    }

    fn build(notifications: Receiver<M>, config: MonitorConfig) -> Self {
        let counters = Arc::new(Counters::default());
        let (wake_tx, wake_rx) = bounded::<()>(1);
        Self {
            notifications,
            schedule: Mutex::new(Schedule::new(config.interval)),
            wake_tx,
            wake_rx,
            cancel: CancelToken::new(),
            check: Hook::empty(),
            handler: Hook::empty(),
            dispatcher: Dispatcher::new(config.thread_name, config.catch_panics, Arc::clone(&counters)),
            running: AtomicBool::new(false),
            counters,
        }
    }

    /// Install the routine invoked on every tick.
    pub fn set_check_func<F>(&self, check: F)
    where
        F: Fn(&CancelToken) + Send + Sync + 'static,
    {
        self.check.set(Arc::new(check));
    }

    /// Remove the check routine. Ticks continue as no-ops.
    pub fn clear_check_func(&self) {
        self.check.clear();
    }

    /// Install the handler invoked once per received message.
    pub fn set_notification_handler<F>(&self, handler: F)
    where
        F: Fn(M) + Send + Sync + 'static,
    {
        self.handler.set(Arc::new(handler));
    }

    /// Remove the notification handler. Received messages are dropped.
    pub fn clear_notification_handler(&self) {
        self.handler.clear();
    }

    /// Change the tick interval.
    ///
    /// While running, the next tick is rearmed to fire `interval` after this
    /// call rather than after the previous tick.
    pub fn set_interval(&self, interval: Duration) -> MonitorResult<()> {
        validate_interval(interval)?;
        let rearmed = self.lock_schedule().set_interval(interval, Instant::now());
        if rearmed {
            // Full means a wake is already pending, which is enough.
            let _ = self.wake_tx.try_send(());
        }
        debug!(interval_ms = duration_ms::as_millis(interval), rearmed, "monitor interval updated");
        Ok(())
    }

    /// Current tick interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.lock_schedule().interval()
    }

    /// The token handed to every check invocation. Cancelling it ends `run`.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Returns true while a thread is inside `run`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Returns true once `stop` was called or the token was cancelled.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.lock_schedule().is_stopped()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> MonitorStats {
        self.counters.snapshot()
    }

    /// Run the control loop on the calling thread until the notification
    /// source closes or the monitor is stopped.
    ///
    /// Only one `run` may be active per monitor; a concurrent call returns
    /// `MonitorError::AlreadyRunning`. A stopped monitor cannot be restarted
    /// and returns `MonitorError::Stopped`.
    pub fn run(&self) -> MonitorResult<ExitReason> {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("monitor run called while already running");
            return Err(MonitorError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        let interval = {
            let mut schedule = self.lock_schedule();
            if schedule.is_stopped() || self.cancel.is_cancelled() {
                warn!("monitor run called after stop");
                return Err(MonitorError::Stopped);
            }
            schedule.arm(Instant::now());
            schedule.interval()
        };
        info!(interval_ms = duration_ms::as_millis(interval), "monitor started");

        let reason = self.event_loop();

        self.lock_schedule().disarm();
        info!(?reason, "monitor loop exited");
        Ok(reason)
    }

    /// Disarm the timer and cancel the token.
    ///
    /// After `stop` returns no new dispatch is started. Invocations already
    /// running keep going until they observe the token or finish. Calling
    /// `stop` more than once is harmless.
    ///
    /// Messages still buffered in the notification source are not drained.
    /// If the loop takes one off the channel after `stop` it is dropped
    /// without reaching the handler and is not counted in `stats`. Producers
    /// that need every message handled should close the source instead and
    /// let `run` return `ExitReason::SourceClosed`.
    pub fn stop(&self) {
        let first = {
            let mut schedule = self.lock_schedule();
            let first = !schedule.is_stopped();
            schedule.stop();
            first
        };
        self.cancel.cancel();
        if first {
            info!("monitor stopped");
        }
    }

    fn event_loop(&self) -> ExitReason {
        loop {
            let timer = self.lock_schedule().deadline().map_or_else(never, at);

            select! {
                recv(self.notifications) -> msg => match msg {
                    Ok(msg) => {
                        if !self.on_notification(msg) {
                            return ExitReason::Cancelled;
                        }
                    }
                    Err(_) => return ExitReason::SourceClosed,
                },
                recv(timer) -> _ => {
                    if !self.on_tick() {
                        return ExitReason::Cancelled;
                    }
                }
                recv(self.wake_rx) -> _ => {
                    debug!("monitor timer rearmed");
                }
                recv(self.cancel.receiver()) -> _ => return ExitReason::Cancelled,
            }
        }
    }

    /// Returns false if the monitor was stopped.
    fn on_tick(&self) -> bool {
        // Dispatch happens under the schedule lock so that `stop` cannot
        // return between the stopped check and the spawn.
        let mut schedule = self.lock_schedule();
        if schedule.is_stopped() || self.cancel.is_cancelled() {
            return false;
        }
        if !schedule.fire(Instant::now()) {
            return true;
        }
        Counters::bump(&self.counters.ticks);

        if let Some(check) = self.check.current() {
            let token = self.cancel.clone();
            self.dispatcher.dispatch(DispatchKind::Check, move || check(&token));
        }
        true
    }

    /// Returns false if the monitor was stopped.
    fn on_notification(&self, msg: M) -> bool {
        let schedule = self.lock_schedule();
        if schedule.is_stopped() || self.cancel.is_cancelled() {
            return false;
        }
        Counters::bump(&self.counters.notifications_received);

        if let Some(handler) = self.handler.current() {
            self.dispatcher.dispatch(DispatchKind::Notification, move || handler(msg));
        }
        drop(schedule);
        true
    }

    fn lock_schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M> Drop for Monitor<M> {
    fn drop(&mut self) {
        // Let in-flight checks observe shutdown even if `stop` was never called.
        self.cancel.cancel();
    }
}

impl<M> std::fmt::Debug for Monitor<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("running", &self.running.load(Ordering::Relaxed))
            .field("cancelled", &self.cancel.is_cancelled())
            .field("check", &self.check)
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use crossbeam_channel::unbounded;

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn new_monitor_uses_default_interval() {
        let (_tx, rx) = unbounded::<String>();
        let monitor = Monitor::new(rx);

        assert_eq!(monitor.interval(), Duration::from_secs(1));
        assert!(!monitor.is_running());
        assert!(!monitor.is_stopped());
        assert_eq!(monitor.stats(), MonitorStats::default());
    }

    #[test]
    fn with_config_validates() {
        let (_tx, rx) = unbounded::<String>();
        let cfg = MonitorConfig {
            interval: Duration::ZERO,
            ..MonitorConfig::default()
        };
        let err = Monitor::with_config(rx, cfg).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidInterval { .. }));
    }

    #[test]
    fn set_interval_rejects_zero_and_keeps_previous() {
        let (_tx, rx) = unbounded::<String>();
        let monitor = Monitor::new(rx);
        monitor.set_interval(Duration::from_millis(100)).unwrap();

        assert!(monitor.set_interval(Duration::ZERO).is_err());
        assert_eq!(monitor.interval(), Duration::from_millis(100));
    }

    #[test]
    fn source_closed_ends_run() {
        let (tx, rx) = unbounded::<String>();
        let monitor = Monitor::new(rx);
        drop(tx);

        assert_eq!(monitor.run().unwrap(), ExitReason::SourceClosed);
        assert!(!monitor.is_running());
    }

    #[test]
    fn run_after_stop_is_refused() {
        let (_tx, rx) = unbounded::<String>();
        let monitor = Monitor::new(rx);
        monitor.stop();
        monitor.stop();

        assert!(monitor.is_stopped());
        assert!(matches!(monitor.run(), Err(MonitorError::Stopped)));
    }

    #[test]
    fn concurrent_run_is_refused() {
        let (_tx, rx) = unbounded::<String>();
        let monitor = Arc::new(Monitor::new(rx));

        let runner = Arc::clone(&monitor);
        let handle = thread::spawn(move || runner.run());
        assert!(wait_until(Duration::from_secs(5), || monitor.is_running()));

        assert!(matches!(monitor.run(), Err(MonitorError::AlreadyRunning)));

        monitor.stop();
        assert_eq!(handle.join().unwrap().unwrap(), ExitReason::Cancelled);
    }

    #[test]
    fn ticks_without_check_are_harmless() {
        let (_tx, rx) = unbounded::<String>();
        let monitor = Arc::new(Monitor::new(rx));
        monitor.set_interval(Duration::from_millis(10)).unwrap();

        let runner = Arc::clone(&monitor);
        let handle = thread::spawn(move || runner.run());

        assert!(wait_until(Duration::from_secs(5), || monitor.stats().ticks >= 3));
        monitor.stop();

        assert_eq!(handle.join().unwrap().unwrap(), ExitReason::Cancelled);
        assert_eq!(monitor.stats().checks_dispatched, 0);
    }

    #[test]
    fn unset_handler_drops_messages() {
        let (tx, rx) = unbounded::<String>();
        let monitor = Arc::new(Monitor::new(rx));

        let runner = Arc::clone(&monitor);
        let handle = thread::spawn(move || runner.run());

        tx.send("ignored".to_string()).unwrap();
        drop(tx);

        assert_eq!(handle.join().unwrap().unwrap(), ExitReason::SourceClosed);
        let stats = monitor.stats();
        assert_eq!(stats.notifications_received, 1);
        assert_eq!(stats.notifications_dispatched, 0);
    }

    #[test]
    fn handler_swap_applies_to_later_messages() {
        let (tx, rx) = unbounded::<u32>();
        let monitor = Arc::new(Monitor::new(rx));
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&first);
        monitor.set_notification_handler(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let runner = Arc::clone(&monitor);
        let handle = thread::spawn(move || runner.run());

        tx.send(1).unwrap();
        assert!(wait_until(Duration::from_secs(5), || first.load(Ordering::SeqCst) == 1));

        let seen = Arc::clone(&second);
        monitor.set_notification_handler(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        tx.send(2).unwrap();
        assert!(wait_until(Duration::from_secs(5), || second.load(Ordering::SeqCst) == 1));

        monitor.stop();
        handle.join().unwrap().unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn huge_interval_before_run_does_not_panic() {
        let (_tx, rx) = unbounded::<String>();
        let monitor = Arc::new(Monitor::new(rx));
        let checks = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&checks);
        monitor.set_check_func(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        monitor.set_interval(Duration::MAX).unwrap();

        let runner = Arc::clone(&monitor);
        let handle = thread::spawn(move || runner.run());
        assert!(wait_until(Duration::from_secs(5), || monitor.is_running()));
        thread::sleep(Duration::from_millis(50));

        monitor.stop();
        assert_eq!(handle.join().unwrap().unwrap(), ExitReason::Cancelled);
        assert_eq!(monitor.stats().ticks, 0);
        assert_eq!(checks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn huge_interval_while_running_parks_then_recovers() {
        let (_tx, rx) = unbounded::<String>();
        let monitor = Arc::new(Monitor::new(rx));
        monitor.set_interval(Duration::from_millis(10)).unwrap();

        let runner = Arc::clone(&monitor);
        let handle = thread::spawn(move || runner.run());
        assert!(wait_until(Duration::from_secs(5), || monitor.stats().ticks >= 1));

        monitor.set_interval(Duration::from_secs(u64::MAX)).unwrap();
        assert_eq!(monitor.interval(), Duration::from_secs(u64::MAX));
        let parked = monitor.stats().ticks;
        thread::sleep(Duration::from_millis(60));
        // At most one tick already in progress when the interval changed.
        assert!(monitor.stats().ticks <= parked + 1);

        monitor.set_interval(Duration::from_millis(10)).unwrap();
        let resumed_from = monitor.stats().ticks;
        assert!(wait_until(Duration::from_secs(5), || monitor.stats().ticks >= resumed_from + 2));

        monitor.stop();
        assert_eq!(handle.join().unwrap().unwrap(), ExitReason::Cancelled);
    }

    #[test]
    fn external_cancel_ends_run() {
        let (_tx, rx) = unbounded::<String>();
        let monitor = Arc::new(Monitor::new(rx));
        let token = monitor.cancel_token();

        let runner = Arc::clone(&monitor);
        let handle = thread::spawn(move || runner.run());
        assert!(wait_until(Duration::from_secs(5), || monitor.is_running()));

        token.cancel();
        assert_eq!(handle.join().unwrap().unwrap(), ExitReason::Cancelled);
        assert!(monitor.is_stopped());
    }
}
