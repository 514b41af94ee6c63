//! Outbound envelopes.
//!
//! An envelope is a self-describing snapshot of a record, not a delta: a
//! device that missed intermediate versions converges by applying the latest
//! envelope it receives.

use crate::{
    DeviceId, EventKind, LifecycleState, NotificationContent, NotificationEvent, NotificationId,
    NotificationRecord, OrderKey, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a notification's state sent to one device target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub id: NotificationId,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    pub lifecycle_state: LifecycleState,
    pub origin_device_id: DeviceId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<NotificationContent>,
}

impl Envelope {
    /// The `(version, timestamp)` ordering key of the snapshot.
    #[must_use]
    pub fn order_key(&self) -> OrderKey {
        OrderKey::new(self.version, self.timestamp)
    }

    /// The event kind that would have produced this snapshot.
    #[must_use]
    pub fn implied_kind(&self) -> EventKind {
        match self.lifecycle_state {
            LifecycleState::Shown => EventKind::Show,
            LifecycleState::Updated => EventKind::Update,
            LifecycleState::Cancelled | LifecycleState::Purged => EventKind::Cancel,
        }
    }

    /// Reconstructs the event this snapshot corresponds to.
    #[must_use]
    pub fn to_event(&self) -> NotificationEvent {
        NotificationEvent {
            id: self.id.clone(),
            kind: self.implied_kind(),
            version: self.version,
            timestamp: self.timestamp,
            origin_device_id: self.origin_device_id.clone(),
            user_id: self.user_id.clone(),
            content: self.content.clone(),
        }
    }
}

impl From<&NotificationRecord> for Envelope {
    fn from(record: &NotificationRecord) -> Self {
        Self {
            id: record.id.clone(),
            version: record.version,
            timestamp: record.timestamp,
            lifecycle_state: record.lifecycle_state,
            origin_device_id: record.origin_device_id.clone(),
            user_id: record.user_id.clone(),
            content: record.content.clone(),
        }
    }
}
