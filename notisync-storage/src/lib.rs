//! Record storage layer for the notification sync core.
//!
//! Holds exactly one [`NotificationRecord`] per notification id. Every
//! operation is atomic per key, but the store does not order writes: callers
//! serialize all access to a key through the coordinator's per-id exclusion.
//!
//! # Backends
//!
//! - [`MemoryRecordStore`]: `HashMap` behind a tokio `RwLock`, for device
//!   replicas that do not need durability and for tests
//! - [`SqliteRecordStore`]: one row per id in a SQLite file; blocking calls
//!   run on the tokio blocking pool

mod error;
mod memory;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use async_trait::async_trait;
use notisync_types::{LifecycleState, NotificationId, NotificationRecord};

/// Durable keyed storage of notification records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns the record for `id`, if one exists.
    async fn get(&self, id: &NotificationId) -> StorageResult<Option<NotificationRecord>>;

    /// Stores `record` under its id, overwriting any previous record.
    async fn put(&self, record: &NotificationRecord) -> StorageResult<()>;

    /// Removes the record for `id`. Returns whether a record existed.
    async fn delete(&self, id: &NotificationId) -> StorageResult<bool>;

    /// Returns every record currently in `state`.
    async fn records_in_state(
        &self,
        state: LifecycleState,
    ) -> StorageResult<Vec<NotificationRecord>>;

    /// Returns the number of stored records, tombstones included.
    async fn len(&self) -> StorageResult<usize>;

    /// Returns true if the store holds no records.
    async fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len().await? == 0)
    }
}
