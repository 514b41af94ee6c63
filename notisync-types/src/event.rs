//! Inbound lifecycle events.
//!
//! An event is produced either by a backend job or by a device (e.g. a user
//! dismissing a notification) and relayed to the sync core. Events are
//! immutable; the producer assigns `version` and `timestamp`, which together
//! define the ordering used for conflict resolution.

use crate::{DeviceId, Error, NotificationContent, NotificationId, Result, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The lifecycle operation an event requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Show,
    Update,
    Cancel,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Show => write!(f, "Show"),
            Self::Update => write!(f, "Update"),
            Self::Cancel => write!(f, "Cancel"),
        }
    }
}

/// Ordering key of an event or record: version first, timestamp on ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}

impl OrderKey {
    #[must_use]
    pub const fn new(version: u64, timestamp: DateTime<Utc>) -> Self {
        Self { version, timestamp }
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.version.cmp(&other.version) {
            Ordering::Equal => self.timestamp.cmp(&other.timestamp),
            other => other,
        }
    }
}

/// A lifecycle event for one notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// The notification this event applies to.
    pub id: NotificationId,

    /// The requested operation.
    pub kind: EventKind,

    /// Producer-assigned version, >= 1.
    pub version: u64,

    /// Producer wall-clock instant; breaks ties on equal versions.
    pub timestamp: DateTime<Utc>,

    /// Device or backend actor that produced the event.
    pub origin_device_id: DeviceId,

    /// Owner of the notification.
    pub user_id: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<NotificationContent>,
}

impl NotificationEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(
        id: impl Into<NotificationId>,
        kind: EventKind,
        version: u64,
        timestamp: DateTime<Utc>,
        origin_device_id: impl Into<DeviceId>,
        user_id: impl Into<UserId>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            version,
            timestamp,
            origin_device_id: origin_device_id.into(),
            user_id: user_id.into(),
            content: None,
        }
    }

    /// Creates a `Show` event carrying content.
    #[must_use]
    pub fn show(
        id: impl Into<NotificationId>,
        version: u64,
        timestamp: DateTime<Utc>,
        origin_device_id: impl Into<DeviceId>,
        user_id: impl Into<UserId>,
        content: NotificationContent,
    ) -> Self {
        Self::new(id, EventKind::Show, version, timestamp, origin_device_id, user_id)
            .with_content(content)
    }

    /// Creates an `Update` event carrying content.
    #[must_use]
    pub fn update(
        id: impl Into<NotificationId>,
        version: u64,
        timestamp: DateTime<Utc>,
        origin_device_id: impl Into<DeviceId>,
        user_id: impl Into<UserId>,
        content: NotificationContent,
    ) -> Self {
        Self::new(id, EventKind::Update, version, timestamp, origin_device_id, user_id)
            .with_content(content)
    }

    /// Creates a `Cancel` event.
    #[must_use]
    pub fn cancel(
        id: impl Into<NotificationId>,
        version: u64,
        timestamp: DateTime<Utc>,
        origin_device_id: impl Into<DeviceId>,
        user_id: impl Into<UserId>,
    ) -> Self {
        Self::new(id, EventKind::Cancel, version, timestamp, origin_device_id, user_id)
    }

    /// Attaches content to the event.
    #[must_use]
    pub fn with_content(mut self, content: NotificationContent) -> Self {
        self.content = Some(content);
        self
    }

    /// The `(version, timestamp)` ordering key.
    #[must_use]
    pub fn order_key(&self) -> OrderKey {
        OrderKey::new(self.version, self.timestamp)
    }

    /// Highest accepted version. Durable stores keep versions in a signed
    /// 64-bit column.
    pub const MAX_VERSION: u64 = i64::MAX as u64;

    /// Checks the wire-level invariants of the event.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidEvent("empty notification id".into()));
        }
        if self.user_id.is_empty() {
            return Err(Error::InvalidEvent(format!("event for {} has no user id", self.id)));
        }
        if self.version == 0 {
            return Err(Error::InvalidEvent(format!("event for {} has version 0", self.id)));
        }
        if self.version > Self::MAX_VERSION {
            return Err(Error::InvalidEvent(format!(
                "event for {} has version {} above {}",
                self.id,
                self.version,
                Self::MAX_VERSION
            )));
        }
        Ok(())
    }

    /// Parses an event from its JSON wire form and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let event: Self = serde_json::from_str(json)?;
        event.validate()?;
        Ok(event)
    }
}
