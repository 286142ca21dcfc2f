//! Monitor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};

/// Interval used when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Static settings for a `Monitor`.
///
/// The interval can still be changed at runtime with `Monitor::set_interval`;
/// the other fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Time between check ticks.
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,
    /// Name prefix for dispatch threads (`<prefix>-check`, `<prefix>-notify`).
    pub thread_name: String,
    /// Catch panics inside dispatched invocations and log them.
    pub catch_panics: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            thread_name: "monitor".to_string(),
            catch_panics: true,
        }
    }
}

impl MonitorConfig {
    /// Parse a JSON document and validate it. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> MonitorResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| MonitorError::config(format!("invalid monitor config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check field constraints.
    pub fn validate(&self) -> MonitorResult<()> {
        validate_interval(self.interval)?;
        if self.thread_name.trim().is_empty() {
            return Err(MonitorError::config("thread_name must not be empty"));
        }
        if self.thread_name.contains('\0') {
            return Err(MonitorError::config("thread_name must not contain NUL bytes"));
        }
        Ok(())
    }
}

pub(crate) fn validate_interval(interval: Duration) -> MonitorResult<()> {
    if interval.is_zero() {
        return Err(MonitorError::InvalidInterval {
            interval_ms: duration_ms::as_millis(interval),
        });
    }
    Ok(())
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Whole milliseconds, saturating at `u64::MAX`.
    pub(crate) fn as_millis(d: Duration) -> u64 {
        u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
    }

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(as_millis(*d))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
