//! Synchronizer configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a LiveValueSynchronizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Polling interval in milliseconds
    #[serde(rename = "interval-ms", default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Minimum weight difference treated as a change
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Fire the first tick on attach instead of after one interval
    #[serde(rename = "immediate-first-tick", default = "default_immediate_first_tick")]
    pub immediate_first_tick: bool,

    /// Deadline for a single fetch; unset means wait indefinitely
    #[serde(rename = "fetch-timeout-ms", default, skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_ms: Option<u64>,

    /// chrono format of the last-update timestamp
    #[serde(rename = "timestamp-format", default = "default_timestamp_format")]
    pub timestamp_format: String,
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_tolerance() -> f64 {
    super::DEFAULT_TOLERANCE
}

fn default_immediate_first_tick() -> bool {
    true
}

fn default_timestamp_format() -> String {
    "%H:%M:%S".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            tolerance: default_tolerance(),
            immediate_first_tick: default_immediate_first_tick(),
            fetch_timeout_ms: None,
            timestamp_format: default_timestamp_format(),
        }
    }
}

impl SyncConfig {
    /// Get the polling interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }
}
