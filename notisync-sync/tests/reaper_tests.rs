mod common;

use chrono::TimeDelta;
use common::{at, content, init_tracing};
use notisync_storage::{MemoryRecordStore, RecordStore, SqliteRecordStore};
use notisync_sync::{KeyedLocks, SyncConfig, TombstoneReaper};
use notisync_types::{LifecycleState, NotificationId, NotificationRecord};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn record(id: &str, version: u64, state: LifecycleState) -> NotificationRecord {
    NotificationRecord {
        id: id.into(),
        version,
        timestamp: at(version as i64),
        lifecycle_state: state,
        origin_device_id: "A".into(),
        user_id: "u1".into(),
        content: Some(content("Order")),
        cancelled_at: None,
        purged_at: None,
    }
}

fn cancelled(id: &str, cancelled_at: i64) -> NotificationRecord {
    NotificationRecord {
        cancelled_at: Some(at(cancelled_at)),
        ..record(id, 3, LifecycleState::Cancelled)
    }
}

fn reaper(store: Arc<dyn RecordStore>, locks: Arc<KeyedLocks>) -> TombstoneReaper {
    let config = SyncConfig {
        lock_timeout_ms: 50,
        ..SyncConfig::default()
    };
    TombstoneReaper::new(store, locks, &config)
}

const DAY: i64 = 24 * 60 * 60;

// ── Purge ────────────────────────────────────────────────────────

#[tokio::test]
async fn expired_cancellation_becomes_tombstone() {
    init_tracing();
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    store.put(&cancelled("o1", 0)).await.unwrap();

    let reaper = reaper(store.clone(), Arc::new(KeyedLocks::new()));
    let now = at(DAY + 3_600);
    let report = reaper.sweep_at(now).await.unwrap();

    assert_eq!(report.purged, vec![NotificationId::new("o1")]);
    let tombstone = store.get(&"o1".into()).await.unwrap().unwrap();
    assert_eq!(tombstone.lifecycle_state, LifecycleState::Purged);
    assert_eq!(tombstone.version, 3);
    assert_eq!(tombstone.content, None);
    assert_eq!(tombstone.purged_at, Some(now));
    assert_eq!(tombstone.cancelled_at, Some(at(0)));
}

#[tokio::test]
async fn cancellation_inside_window_is_kept() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    store.put(&cancelled("o1", 0)).await.unwrap();

    let report = reaper(store.clone(), Arc::new(KeyedLocks::new()))
        .sweep_at(at(DAY))
        .await
        .unwrap();

    assert!(report.is_empty());
    let rec = store.get(&"o1".into()).await.unwrap().unwrap();
    assert_eq!(rec.lifecycle_state, LifecycleState::Cancelled);
}

#[tokio::test]
async fn live_records_are_never_purged() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    store.put(&record("o1", 1, LifecycleState::Shown)).await.unwrap();
    store.put(&record("o2", 2, LifecycleState::Updated)).await.unwrap();

    let report = reaper(store.clone(), Arc::new(KeyedLocks::new()))
        .sweep_at(at(365 * DAY))
        .await
        .unwrap();

    assert!(report.is_empty());
    assert_eq!(store.len().await.unwrap(), 2);
}

#[tokio::test]
async fn contended_record_is_skipped_until_next_sweep() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    store.put(&cancelled("o1", 0)).await.unwrap();
    let locks = Arc::new(KeyedLocks::new());
    let reaper = reaper(store.clone(), locks.clone());

    let guard = locks.acquire(&"o1".into(), Duration::from_secs(1)).await.unwrap();
    let report = reaper.sweep_at(at(2 * DAY)).await.unwrap();
    assert!(report.purged.is_empty());
    assert_eq!(report.skipped, 1);
    drop(guard);

    let report = reaper.sweep_at(at(2 * DAY)).await.unwrap();
    assert_eq!(report.purged.len(), 1);
}

#[tokio::test]
async fn reopened_record_is_not_purged() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    store.put(&cancelled("o1", 0)).await.unwrap();
    let locks = Arc::new(KeyedLocks::new());
    let reaper = Arc::new(reaper(store.clone(), locks.clone()));

    // A winning update commits while the sweep is waiting on the lock.
    let guard = locks.acquire(&"o1".into(), Duration::from_secs(1)).await.unwrap();
    let config = SyncConfig::default();
    let patient = TombstoneReaper::new(store.clone(), locks.clone(), &config);
    let sweep = tokio::spawn(async move { patient.sweep_at(at(2 * DAY)).await.unwrap() });
    tokio::time::sleep(Duration::from_millis(20)).await;
    store.put(&record("o1", 4, LifecycleState::Updated)).await.unwrap();
    drop(guard);

    let report = sweep.await.unwrap();
    assert!(report.purged.is_empty());
    assert_eq!(report.skipped, 1);
    let rec = store.get(&"o1".into()).await.unwrap().unwrap();
    assert_eq!(rec.lifecycle_state, LifecycleState::Updated);
    assert!(reaper.sweep_at(at(2 * DAY)).await.unwrap().is_empty());
}

// ── Compaction ───────────────────────────────────────────────────

#[tokio::test]
async fn old_tombstones_are_deleted() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    store.put(&cancelled("o1", 0)).await.unwrap();
    let reaper = reaper(store.clone(), Arc::new(KeyedLocks::new()));

    let purged_at = at(2 * DAY);
    reaper.sweep_at(purged_at).await.unwrap();

    let report = reaper.sweep_at(purged_at + TimeDelta::days(7)).await.unwrap();
    assert!(report.compacted.is_empty());
    assert!(store.get(&"o1".into()).await.unwrap().is_some());

    let report = reaper
        .sweep_at(purged_at + TimeDelta::days(7) + TimeDelta::seconds(1))
        .await
        .unwrap();
    assert_eq!(report.compacted, vec![NotificationId::new("o1")]);
    assert!(store.get(&"o1".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn sweep_works_against_sqlite() {
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
    store.put(&cancelled("o1", 0)).await.unwrap();
    store.put(&cancelled("o2", DAY)).await.unwrap();

    let report = reaper(store.clone(), Arc::new(KeyedLocks::new()))
        .sweep_at(at(DAY + 60))
        .await
        .unwrap();

    assert_eq!(report.purged, vec![NotificationId::new("o1")]);
    let purged = store.records_in_state(LifecycleState::Purged).await.unwrap();
    assert_eq!(purged.len(), 1);
    assert_eq!(purged[0].id.as_str(), "o1");
}

// ── Runtime ──────────────────────────────────────────────────────

#[tokio::test]
async fn spawned_reaper_sweeps_until_stopped() {
    init_tracing();
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    let long_ago = NotificationRecord {
        cancelled_at: Some(chrono::Utc::now() - TimeDelta::days(2)),
        ..record("o1", 3, LifecycleState::Cancelled)
    };
    store.put(&long_ago).await.unwrap();

    let reaper = Arc::new(reaper(store.clone(), Arc::new(KeyedLocks::new())));
    let handle = reaper.spawn(Duration::from_millis(10));

    let mut purged = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let rec = store.get(&"o1".into()).await.unwrap().unwrap();
        if rec.lifecycle_state == LifecycleState::Purged {
            purged = true;
            break;
        }
    }
    handle.stop().await;
    assert!(purged);
}
