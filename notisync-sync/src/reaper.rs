//! Tombstone reaper.
//!
//! A periodic sweep, independent of inbound traffic:
//! 1. Cancelled records whose retention window has elapsed become content-free
//!    tombstones (`Purged`). Tombstones keep rejecting late events.
//! 2. Tombstones older than the tombstone retention are deleted, bounding
//!    storage growth.
//!
//! Every mutation takes the same per-id lock the coordinator uses and
//! re-reads the record inside it, so a purge never races an in-flight event
//! for the same id.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::locks::KeyedLocks;
use chrono::{DateTime, TimeDelta, Utc};
use notisync_storage::RecordStore;
use notisync_types::{LifecycleState, NotificationId, NotificationRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReapReport {
    /// Records turned into tombstones.
    pub purged: Vec<NotificationId>,
    /// Tombstones deleted from the store.
    pub compacted: Vec<NotificationId>,
    /// Candidates left for a later sweep (lock contention or changed state).
    pub skipped: usize,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.purged.is_empty() && self.compacted.is_empty() && self.skipped == 0
    }
}

/// Ages out cancelled records.
pub struct TombstoneReaper {
    store: Arc<dyn RecordStore>,
    locks: Arc<KeyedLocks>,
    retention_window: TimeDelta,
    tombstone_retention: TimeDelta,
    lock_timeout: Duration,
}

impl TombstoneReaper {
    /// Creates a reaper sharing `locks` with the coordinator that owns `store`.
    pub fn new(store: Arc<dyn RecordStore>, locks: Arc<KeyedLocks>, config: &SyncConfig) -> Self {
        Self {
            store,
            locks,
            retention_window: to_delta(config.retention_window()),
            tombstone_retention: to_delta(config.tombstone_retention()),
            lock_timeout: config.lock_timeout(),
        }
    }

    /// Runs one sweep against the current wall clock.
    pub async fn sweep(&self) -> SyncResult<ReapReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Runs one sweep as if the wall clock read `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SyncResult<ReapReport> {
        let mut report = ReapReport::default();

        for candidate in self.store.records_in_state(LifecycleState::Cancelled).await? {
            if !self.purge_due(&candidate, now) {
                continue;
            }
            if self.purge(&candidate.id, now).await? {
                report.purged.push(candidate.id);
            } else {
                report.skipped += 1;
            }
        }

        for tombstone in self.store.records_in_state(LifecycleState::Purged).await? {
            if !self.compaction_due(&tombstone, now) {
                continue;
            }
            if self.compact(&tombstone.id, now).await? {
                report.compacted.push(tombstone.id);
            } else {
                report.skipped += 1;
            }
        }

        if !report.is_empty() {
            info!(
                "Reaper sweep: {} purged, {} compacted, {} skipped",
                report.purged.len(),
                report.compacted.len(),
                report.skipped
            );
        }
        Ok(report)
    }

    /// Runs sweeps every `interval` until the returned handle is stopped.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> ReaperHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep().await {
                            error!("Reaper sweep failed: {}", e);
                        }
                    }
                }
            }
            debug!("Reaper stopped");
        });
        ReaperHandle { stop_tx, join }
    }

    fn purge_due(&self, record: &NotificationRecord, now: DateTime<Utc>) -> bool {
        let cancelled_at = record.cancelled_at.unwrap_or(record.timestamp);
        record.lifecycle_state == LifecycleState::Cancelled
            && now.signed_duration_since(cancelled_at) > self.retention_window
    }

    fn compaction_due(&self, record: &NotificationRecord, now: DateTime<Utc>) -> bool {
        record.is_tombstone()
            && record
                .purged_at
                .is_some_and(|purged_at| now.signed_duration_since(purged_at) > self.tombstone_retention)
    }

    async fn purge(&self, id: &NotificationId, now: DateTime<Utc>) -> SyncResult<bool> {
        let _guard = match self.locks.acquire(id, self.lock_timeout).await {
            Ok(guard) => guard,
            Err(SyncError::LockTimeout { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };

        let Some(current) = self.store.get(id).await? else {
            return Ok(false);
        };
        if !self.purge_due(&current, now) {
            debug!("{} changed since scan; not purging", id);
            return Ok(false);
        }

        self.store.put(&current.into_tombstone(now)).await?;
        debug!("Purged {}", id);
        Ok(true)
    }

    async fn compact(&self, id: &NotificationId, now: DateTime<Utc>) -> SyncResult<bool> {
        let _guard = match self.locks.acquire(id, self.lock_timeout).await {
            Ok(guard) => guard,
            Err(SyncError::LockTimeout { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };

        match self.store.get(id).await? {
            Some(current) if self.compaction_due(&current, now) => {
                self.store.delete(id).await?;
                debug!("Deleted tombstone {}", id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Handle to a spawned reaper loop. Dropping it also stops the loop.
pub struct ReaperHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stops the loop and waits for the in-progress sweep to finish.
    pub async fn stop(self) {
        let Self { stop_tx, join } = self;
        let _ = stop_tx.send(());
        if let Err(e) = join.await {
            error!("Reaper task ended abnormally: {}", e);
        }
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
