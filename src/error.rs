//! Error types for the monitor.
//!
//! The monitor itself performs no I/O, so every variant here describes either
//! a configuration problem or lifecycle misuse. Failures inside check routines
//! and notification handlers are never reported through this type.

use thiserror::Error;

/// Top-level error type for monitor operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid interval: {interval_ms}ms (must be greater than zero)")]
    InvalidInterval {
        interval_ms: u64,
    },

    #[error("Monitor is already running")]
    AlreadyRunning,

    #[error("Monitor has been stopped and cannot be reused")]
    Stopped,

    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },
}

impl MonitorError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if the error comes from calling the lifecycle out of order.
    #[must_use]
    pub const fn is_misuse(&self) -> bool {
        matches!(self, Self::AlreadyRunning | Self::Stopped)
    }

    /// Returns true if the error comes from a bad interval or config document.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::InvalidInterval { .. } | Self::Config { .. })
    }
}

/// Result type alias for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
