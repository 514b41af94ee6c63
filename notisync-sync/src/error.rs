//! Error types for the sync layer.

use notisync_storage::StorageError;
use notisync_types::{DeviceId, NotificationId};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The event lost conflict resolution.
    #[error("stale event for {id}")]
    StaleEvent { id: NotificationId },

    /// The event references an id with no record on this replica.
    #[error("unknown notification id: {id}")]
    UnknownId { id: NotificationId },

    /// The event targets a purged notification.
    #[error("notification {id} is tombstoned")]
    Tombstoned { id: NotificationId },

    /// Publishing to one device target failed.
    #[error("target {device} unreachable: {reason}")]
    TargetUnreachable { device: DeviceId, reason: String },

    /// The record store could not be read or written.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    /// The event violates the wire schema.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// The per-id critical section could not be acquired in time.
    #[error("timed out waiting for lock on {id}")]
    LockTimeout { id: NotificationId },

    /// Device registry lookup failed.
    #[error("device registry error: {0}")]
    Registry(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Channel closed.
    #[error("channel closed")]
    ChannelClosed,
}

impl SyncError {
    /// Returns true for conditions that are normal under unordered,
    /// at-least-once delivery and are handled without surfacing a failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StaleEvent { .. }
                | Self::UnknownId { .. }
                | Self::Tombstoned { .. }
                | Self::TargetUnreachable { .. }
        )
    }

    /// Returns true if the caller should redeliver the event later.
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::LockTimeout { .. })
    }
}

impl From<notisync_types::Error> for SyncError {
    fn from(e: notisync_types::Error) -> Self {
        match e {
            notisync_types::Error::Serialization(e) => Self::Serialization(e),
            other => Self::InvalidEvent(other.to_string()),
        }
    }
}
