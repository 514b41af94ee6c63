//! Conflict resolution.
//!
//! A pure, deterministic decision over the current record and an incoming
//! event. Every replica runs the same rules, so replicas that eventually see
//! the same set of events (in any order, with duplicates) end in the same
//! state.
//!
//! Ordering is lexicographic on `(version, timestamp)`. An event wins only
//! if its key is strictly greater than the record's; an exact tie loses, so
//! a duplicate delivery is always rejected as stale.

use crate::error::SyncError;
use chrono::{DateTime, Utc};
use notisync_types::{
    Envelope, EventKind, LifecycleState, NotificationEvent, NotificationId, NotificationRecord,
};
use std::fmt;

/// Why an event was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// No record exists and the event is not a `Show`.
    UnknownId,
    /// The record is purged; nothing can reopen it.
    Tombstoned,
    /// The event does not order after the current record.
    Stale,
}

impl RejectReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownId => "unknown-id",
            Self::Tombstoned => "tombstoned",
            Self::Stale => "stale",
        }
    }

    /// The error class this rejection belongs to.
    pub fn into_error(self, id: NotificationId) -> SyncError {
        match self {
            Self::UnknownId => SyncError::UnknownId { id },
            Self::Tombstoned => SyncError::Tombstoned { id },
            Self::Stale => SyncError::StaleEvent { id },
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of resolving one event against one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Commit this record.
    Apply(NotificationRecord),
    /// Leave the record untouched.
    Reject(RejectReason),
}

impl Outcome {
    pub fn is_apply(&self) -> bool {
        matches!(self, Self::Apply(_))
    }

    /// The record to commit, if the outcome is `Apply`.
    pub fn record(&self) -> Option<&NotificationRecord> {
        match self {
            Self::Apply(record) => Some(record),
            Self::Reject(_) => None,
        }
    }

    /// The rejection reason, if the outcome is `Reject`.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Apply(_) => None,
            Self::Reject(reason) => Some(*reason),
        }
    }
}

/// Stateless conflict resolver.
pub struct ConflictResolver;

impl ConflictResolver {
    /// Resolves an inbound lifecycle event.
    ///
    /// `now` is the local instant recorded as `cancelled_at` when a cancel
    /// is accepted.
    pub fn resolve(
        current: Option<&NotificationRecord>,
        event: &NotificationEvent,
        now: DateTime<Utc>,
    ) -> Outcome {
        let current = match current {
            None if event.kind == EventKind::Show => {
                return Outcome::Apply(NotificationRecord {
                    id: event.id.clone(),
                    version: event.version,
                    timestamp: event.timestamp,
                    lifecycle_state: LifecycleState::Shown,
                    origin_device_id: event.origin_device_id.clone(),
                    user_id: event.user_id.clone(),
                    content: event.content.clone(),
                    cancelled_at: None,
                    purged_at: None,
                });
            }
            None => return Outcome::Reject(RejectReason::UnknownId),
            Some(current) => current,
        };

        if current.is_tombstone() {
            return Outcome::Reject(RejectReason::Tombstoned);
        }
        if event.order_key() <= current.order_key() {
            return Outcome::Reject(RejectReason::Stale);
        }

        let state = match event.kind {
            EventKind::Cancel => LifecycleState::Cancelled,
            EventKind::Show | EventKind::Update => LifecycleState::Updated,
        };
        Outcome::Apply(Self::advance(current, event, state, now))
    }

    /// Resolves a snapshot received from the fanout of another replica.
    ///
    /// Uses the same ordering rule as [`resolve`](Self::resolve), but a
    /// snapshot is authoritative for its state: an absent record accepts any
    /// snapshot, so a device that missed the original `Show` still converges.
    pub fn resolve_snapshot(
        current: Option<&NotificationRecord>,
        envelope: &Envelope,
        now: DateTime<Utc>,
    ) -> Outcome {
        // A purge never travels; treat a stray one as the cancel it implies.
        let state = match envelope.lifecycle_state {
            LifecycleState::Purged => LifecycleState::Cancelled,
            other => other,
        };
        let event = envelope.to_event();

        match current {
            None => Outcome::Apply(NotificationRecord {
                id: envelope.id.clone(),
                version: envelope.version,
                timestamp: envelope.timestamp,
                lifecycle_state: state,
                origin_device_id: envelope.origin_device_id.clone(),
                user_id: envelope.user_id.clone(),
                content: envelope.content.clone(),
                cancelled_at: (state == LifecycleState::Cancelled).then_some(now),
                purged_at: None,
            }),
            Some(current) if current.is_tombstone() => Outcome::Reject(RejectReason::Tombstoned),
            Some(current) if event.order_key() <= current.order_key() => {
                Outcome::Reject(RejectReason::Stale)
            }
            Some(current) => Outcome::Apply(Self::advance(current, &event, state, now)),
        }
    }

    fn advance(
        current: &NotificationRecord,
        event: &NotificationEvent,
        state: LifecycleState,
        now: DateTime<Utc>,
    ) -> NotificationRecord {
        let cancelled_at = match (state, current.lifecycle_state) {
            (LifecycleState::Cancelled, LifecycleState::Cancelled) => {
                current.cancelled_at.or(Some(now))
            }
            (LifecycleState::Cancelled, _) => Some(now),
            _ => None,
        };

        NotificationRecord {
            id: current.id.clone(),
            version: event.version,
            timestamp: event.timestamp,
            lifecycle_state: state,
            origin_device_id: event.origin_device_id.clone(),
            user_id: current.user_id.clone(),
            // An event without content keeps what the record already shows.
            content: event.content.clone().or_else(|| current.content.clone()),
            cancelled_at,
            purged_at: None,
        }
    }
}
