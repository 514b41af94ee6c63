//! Sync core configuration.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default retention of cancelled records before they are purged.
pub const DEFAULT_RETENTION_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Default retention of tombstones before they are deleted.
pub const DEFAULT_TOMBSTONE_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;

const MAX_STORE_RETRY_DOUBLINGS: u32 = 6;

/// Configuration for the coordinator, fanout dispatcher and reaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How long a cancelled record is kept before it becomes a tombstone.
    pub retention_window_secs: u64,
    /// How long a tombstone is kept before it is deleted.
    pub tombstone_retention_secs: u64,
    /// Interval between reaper sweeps.
    pub sweep_interval_secs: u64,
    /// Maximum wait for the per-notification lock (ms).
    pub lock_timeout_ms: u64,
    /// Delay before a contended event is resubmitted (ms).
    pub requeue_delay_ms: u64,
    /// Timeout for a single publish to one device (ms).
    pub publish_timeout_ms: u64,
    /// Capacity of the coordinator's command and event channels.
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retention_window_secs: DEFAULT_RETENTION_WINDOW_SECS,
            tombstone_retention_secs: DEFAULT_TOMBSTONE_RETENTION_SECS,
            sweep_interval_secs: 300,
            lock_timeout_ms: 5_000,
            requeue_delay_ms: 100,
            publish_timeout_ms: 10_000,
            channel_capacity: 256,
        }
    }
}

impl SyncConfig {
    /// Parses a JSON configuration document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> SyncResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Rejects values that would disable a bounded wait or the sweep.
    pub fn validate(&self) -> SyncResult<()> {
        if self.lock_timeout_ms == 0 {
            return Err(SyncError::Config("lock_timeout_ms must be > 0".into()));
        }
        if self.publish_timeout_ms == 0 {
            return Err(SyncError::Config("publish_timeout_ms must be > 0".into()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(SyncError::Config("sweep_interval_secs must be > 0".into()));
        }
        if self.channel_capacity == 0 {
            return Err(SyncError::Config("channel_capacity must be > 0".into()));
        }
        Ok(())
    }

    pub fn retention_window(&self) -> Duration {
        Duration::from_secs(self.retention_window_secs)
    }

    pub fn tombstone_retention(&self) -> Duration {
        Duration::from_secs(self.tombstone_retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.requeue_delay_ms)
    }

    /// Backoff before retrying an event after a store failure: the requeue
    /// delay doubled per attempt, capped at 64 times the base.
    pub fn store_retry_delay(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(MAX_STORE_RETRY_DOUBLINGS);
        self.requeue_delay().saturating_mul(1 << doublings)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}
