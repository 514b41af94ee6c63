//! Durable record store backed by SQLite.
//!
//! One row per notification id. `put` is an `INSERT OR REPLACE`, so every
//! write is a full overwrite of the row.

use crate::{RecordStore, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use notisync_types::{LifecycleState, NotificationContent, NotificationId, NotificationRecord};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const RECORD_COLUMNS: &str = "id, version, timestamp, lifecycle_state, origin_device_id, user_id, content, cancelled_at, purged_at";

/// Record store persisted to a SQLite database.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Opens (or creates) a record store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!("Opened record store at {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    /// Opens an in-memory record store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS notification_records (
                id TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                lifecycle_state TEXT NOT NULL,
                origin_device_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                content TEXT,
                cancelled_at TEXT,
                purged_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_notification_records_state
                ON notification_records (lifecycle_state);
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("record store connection poisoned".into()))
    }

    // ── Blocking operations ──────────────────────────────────────

    /// Loads a record.
    pub fn get_blocking(&self, id: &NotificationId) -> StorageResult<Option<NotificationRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM notification_records WHERE id = ?1"),
                params![id.as_str()],
                RawRecord::from_row,
            )
            .optional()?;
        row.map(RawRecord::decode).transpose()
    }

    /// Writes a record, replacing any existing row for the same id.
    pub fn put_blocking(&self, record: &NotificationRecord) -> StorageResult<()> {
        let version = i64::try_from(record.version).map_err(|_| {
            StorageError::InvalidData(format!("version {} out of range", record.version))
        })?;
        let content = record
            .content
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO notification_records ({RECORD_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                record.id.as_str(),
                version,
                encode_instant(&record.timestamp),
                record.lifecycle_state.as_str(),
                record.origin_device_id.as_str(),
                record.user_id.as_str(),
                content,
                record.cancelled_at.as_ref().map(encode_instant),
                record.purged_at.as_ref().map(encode_instant),
            ],
        )?;
        Ok(())
    }

    /// Deletes a record. Returns whether a row was removed.
    pub fn delete_blocking(&self, id: &NotificationId) -> StorageResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM notification_records WHERE id = ?1",
            params![id.as_str()],
        )?;
        Ok(removed > 0)
    }

    /// Loads every record in the given lifecycle state.
    pub fn records_in_state_blocking(
        &self,
        state: LifecycleState,
    ) -> StorageResult<Vec<NotificationRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM notification_records WHERE lifecycle_state = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![state.as_str()], RawRecord::from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?.decode()?);
        }
        Ok(result)
    }

    /// Counts stored records.
    pub fn len_blocking(&self) -> StorageResult<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM notification_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn run_blocking<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteRecordStore) -> StorageResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StorageError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, id: &NotificationId) -> StorageResult<Option<NotificationRecord>> {
        let id = id.clone();
        self.run_blocking(move |s| s.get_blocking(&id)).await
    }

    async fn put(&self, record: &NotificationRecord) -> StorageResult<()> {
        let record = record.clone();
        self.run_blocking(move |s| s.put_blocking(&record)).await
    }

    async fn delete(&self, id: &NotificationId) -> StorageResult<bool> {
        let id = id.clone();
        self.run_blocking(move |s| s.delete_blocking(&id)).await
    }

    async fn records_in_state(
        &self,
        state: LifecycleState,
    ) -> StorageResult<Vec<NotificationRecord>> {
        self.run_blocking(move |s| s.records_in_state_blocking(state))
            .await
    }

    async fn len(&self) -> StorageResult<usize> {
        self.run_blocking(|s| s.len_blocking()).await
    }
}

/// A row as read from SQLite, before decoding.
struct RawRecord {
    id: String,
    version: i64,
    timestamp: String,
    lifecycle_state: String,
    origin_device_id: String,
    user_id: String,
    content: Option<String>,
    cancelled_at: Option<String>,
    purged_at: Option<String>,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            version: row.get(1)?,
            timestamp: row.get(2)?,
            lifecycle_state: row.get(3)?,
            origin_device_id: row.get(4)?,
            user_id: row.get(5)?,
            content: row.get(6)?,
            cancelled_at: row.get(7)?,
            purged_at: row.get(8)?,
        })
    }

    fn decode(self) -> StorageResult<NotificationRecord> {
        let version = u64::try_from(self.version)
            .map_err(|_| StorageError::InvalidData(format!("negative version for {}", self.id)))?;
        let lifecycle_state: LifecycleState = self
            .lifecycle_state
            .parse()
            .map_err(|e| StorageError::InvalidData(format!("{e}")))?;
        let content = self
            .content
            .as_deref()
            .map(serde_json::from_str::<NotificationContent>)
            .transpose()?;

        Ok(NotificationRecord {
            id: NotificationId::new(self.id),
            version,
            timestamp: decode_instant(&self.timestamp)?,
            lifecycle_state,
            origin_device_id: self.origin_device_id.into(),
            user_id: self.user_id.into(),
            content,
            cancelled_at: self.cancelled_at.as_deref().map(decode_instant).transpose()?,
            purged_at: self.purged_at.as_deref().map(decode_instant).transpose()?,
        })
    }
}

fn encode_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_instant(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("invalid instant {s:?}: {e}")))
}
