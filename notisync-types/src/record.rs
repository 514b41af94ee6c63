//! The per-notification synchronization record.

use crate::{DeviceId, NotificationContent, NotificationId, OrderKey, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a notification on one replica.
///
/// `Absent` is not represented: an absent notification has no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    Shown,
    Updated,
    Cancelled,
    /// Terminal. The record is kept only as a tombstone.
    Purged,
}

impl LifecycleState {
    /// Returns true for states a notification can never leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Purged)
    }

    /// Returns true while the notification is visible to the user.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Shown | Self::Updated)
    }

    /// Stable string form used in persistent storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shown => "Shown",
            Self::Updated => "Updated",
            Self::Cancelled => "Cancelled",
            Self::Purged => "Purged",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Shown" => Ok(Self::Shown),
            "Updated" => Ok(Self::Updated),
            "Cancelled" => Ok(Self::Cancelled),
            "Purged" => Ok(Self::Purged),
            other => Err(crate::Error::InvalidState(other.to_string())),
        }
    }
}

/// Synchronization state of one logical notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    pub lifecycle_state: LifecycleState,
    /// Producer of the last applied mutation.
    pub origin_device_id: DeviceId,
    pub user_id: UserId,
    #[serde(default)]
    pub content: Option<NotificationContent>,
    /// When the record entered `Cancelled` on this replica.
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// When the record became a tombstone on this replica.
    #[serde(default)]
    pub purged_at: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// The `(version, timestamp)` ordering key of the last applied mutation.
    #[must_use]
    pub fn order_key(&self) -> OrderKey {
        OrderKey::new(self.version, self.timestamp)
    }

    /// Returns true if the record is a tombstone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.lifecycle_state == LifecycleState::Purged
    }

    /// Converts a cancelled record into a content-free tombstone.
    ///
    /// Version, timestamp and `cancelled_at` are kept so any later event can
    /// still be recognised and rejected.
    #[must_use]
    pub fn into_tombstone(self, purged_at: DateTime<Utc>) -> Self {
        Self {
            lifecycle_state: LifecycleState::Purged,
            content: None,
            purged_at: Some(purged_at),
            ..self
        }
    }
}
