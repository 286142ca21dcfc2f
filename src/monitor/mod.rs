//! Periodic monitor: a timer-driven check loop plus a notification consumer.
//!
//! The control loop lives in `runner`; the remaining modules are the pieces it
//! is assembled from and can be read on their own.

/// Cooperative cancellation token.
pub mod cancel;
/// Static configuration and JSON loading.
pub mod config;
/// Swappable hooks and thread-per-invocation dispatch.
pub mod hooks;
/// Control loop and lifecycle.
pub mod runner;
mod schedule;
/// Dispatch counters.
pub mod stats;

pub use cancel::CancelToken;
pub use config::{MonitorConfig, DEFAULT_INTERVAL};
pub use hooks::{CheckFn, NotifyFn};
pub use runner::{ExitReason, Monitor};
pub use stats::MonitorStats;
