//! Per-notification mutual exclusion.
//!
//! Every read-resolve-commit for a notification id runs while holding that
//! id's lock. Different ids never contend. Slots are created on demand and
//! dropped once nobody holds or waits on them, so the table stays bounded
//! by the number of in-flight ids.

use crate::error::{SyncError, SyncResult};
use notisync_types::NotificationId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// Table of per-id async locks.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<NotificationId, Slot>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `id`, waiting at most `wait`.
    pub async fn acquire(&self, id: &NotificationId, wait: Duration) -> SyncResult<KeyGuard<'_>> {
        let slot = self.slot(id);
        match tokio::time::timeout(wait, slot.lock_owned()).await {
            Ok(guard) => Ok(KeyGuard {
                locks: self,
                id: id.clone(),
                guard: Some(guard),
            }),
            Err(_) => {
                self.release(id);
                Err(SyncError::LockTimeout { id: id.clone() })
            }
        }
    }

    /// Number of ids currently held or waited on.
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn slot(&self, id: &NotificationId) -> Slot {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.clone())
            .or_default()
            .clone()
    }

    fn release(&self, id: &NotificationId) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference is the table's own; anything above is a holder or waiter.
        if slots.get(id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(id);
        }
    }
}

/// Holds the lock for one id until dropped.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    id: NotificationId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyGuard<'_> {
    pub fn id(&self) -> &NotificationId {
        &self.id
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.id);
    }
}
