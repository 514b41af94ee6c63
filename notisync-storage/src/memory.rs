//! In-memory record store.

use crate::{RecordStore, StorageResult};
use async_trait::async_trait;
use notisync_types::{LifecycleState, NotificationId, NotificationRecord};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Record store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<NotificationId, NotificationRecord>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, id: &NotificationId) -> StorageResult<Option<NotificationRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn put(&self, record: &NotificationRecord) -> StorageResult<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &NotificationId) -> StorageResult<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn records_in_state(
        &self,
        state: LifecycleState,
    ) -> StorageResult<Vec<NotificationRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.lifecycle_state == state)
            .cloned()
            .collect())
    }

    async fn len(&self) -> StorageResult<usize> {
        Ok(self.records.read().await.len())
    }
}
