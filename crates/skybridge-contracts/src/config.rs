//! Construction-time configuration.
//!
//! `TelemetryConfig` is deserialized from TOML.  Every field has a default so
//! an empty document is valid.  Values are read once when the bus and audit
//! chain are built and are never changed at runtime.
//!
//! Example:
//! ```toml
//! [bus]
//! main_queue_capacity = 1024
//! subscriber_capacity = 256
//! meta_event_min_interval_ms = 1000
//!
//! [audit]
//! enabled = true
//! max_entries_per_session = 1000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TelemetryError, TelemetryResult};

/// Limits for the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Maximum number of events waiting for first dispatch.
    pub main_queue_capacity: usize,
    /// Maximum number of events pending in any one subscriber's queue.
    pub subscriber_capacity: usize,
    /// Minimum spacing between two overflow meta-events, in milliseconds.
    pub meta_event_min_interval_ms: u64,
}

impl BusConfig {
    pub const DEFAULT_MAIN_QUEUE_CAPACITY: usize = 1024;
    pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;
    pub const DEFAULT_META_EVENT_MIN_INTERVAL_MS: u64 = 1000;

    /// The meta-event interval as a `Duration`.
    pub fn meta_event_min_interval(&self) -> Duration {
        Duration::from_millis(self.meta_event_min_interval_ms)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            main_queue_capacity: Self::DEFAULT_MAIN_QUEUE_CAPACITY,
            subscriber_capacity: Self::DEFAULT_SUBSCRIBER_CAPACITY,
            meta_event_min_interval_ms: Self::DEFAULT_META_EVENT_MIN_INTERVAL_MS,
        }
    }
}

/// Settings for the audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// When false, `record` is a no-op.
    pub enabled: bool,
    /// Retained entries per session; the oldest are trimmed first.
    pub max_entries_per_session: usize,
}

impl AuditConfig {
    pub const DEFAULT_MAX_ENTRIES_PER_SESSION: usize = 1000;
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries_per_session: Self::DEFAULT_MAX_ENTRIES_PER_SESSION,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub bus: BusConfig,
    pub audit: AuditConfig,
}

impl TelemetryConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `TelemetryError::ConfigError` if the TOML is malformed, does not
    /// match the schema, or fails `validate`.
    pub fn from_toml_str(s: &str) -> TelemetryResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| TelemetryError::ConfigError {
            reason: format!("failed to parse telemetry TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it with `from_toml_str`.
    pub fn from_file(path: &Path) -> TelemetryResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TelemetryError::ConfigError {
            reason: format!("failed to read telemetry config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject values that would make a component unusable.
    ///
    /// This does not clamp; callers that want clamping do it before building
    /// the config.
    pub fn validate(&self) -> TelemetryResult<()> {
        if self.bus.main_queue_capacity == 0 {
            return Err(TelemetryError::ConfigError {
                reason: "bus.main_queue_capacity must be at least 1".to_string(),
            });
        }
        if self.bus.subscriber_capacity == 0 {
            return Err(TelemetryError::ConfigError {
                reason: "bus.subscriber_capacity must be at least 1".to_string(),
            });
        }
        if self.audit.max_entries_per_session == 0 {
            return Err(TelemetryError::ConfigError {
                reason: "audit.max_entries_per_session must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
