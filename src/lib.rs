//! # periodic-monitor
//!
//! A long-lived background loop that runs a check routine on a configurable
//! cadence while draining an inbound notification channel.
//!
//! ## Core Concepts
//!
//! - **Monitor**: the control loop. Blocks in `run`, ends on `stop` or when the
//!   notification source closes
//! - **Check routine**: invoked on every tick with a `CancelToken`
//! - **Notification handler**: invoked once per received message
//! - **CancelToken**: one-shot broadcast signal that long-running checks poll
//!   or wait on
//!
//! Every invocation runs on its own thread and is never awaited, so a slow
//! check cannot delay the next tick and overlapping checks are expected.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! use periodic_monitor::Monitor;
//!
//! let (tx, rx) = crossbeam_channel::unbounded::<String>();
//! let monitor = Arc::new(Monitor::new(rx));
//! monitor.set_interval(Duration::from_millis(100))?;
//! monitor.set_check_func(|token| {
//!     if !token.wait_timeout(Duration::from_millis(20)) {
//!         println!("token still valid");
//!     }
//! });
//! monitor.set_notification_handler(|msg| println!("revoked: {msg}"));
//!
//! let runner = Arc::clone(&monitor);
//! let loop_thread = thread::spawn(move || runner.run());
//!
//! tx.send("session-42".to_string()).unwrap();
//! monitor.stop();
//! loop_thread.join().unwrap()?;
//! # Ok::<(), periodic_monitor::MonitorError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod monitor;

// Re-export primary types at crate root for convenience
pub use error::{MonitorError, MonitorResult};
pub use monitor::{
    CancelToken, CheckFn, ExitReason, Monitor, MonitorConfig, MonitorStats, NotifyFn, DEFAULT_INTERVAL,
};
