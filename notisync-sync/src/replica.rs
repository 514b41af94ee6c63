//! Device-side replica.
//!
//! Each device keeps its own copy of the records it has seen and applies
//! envelopes from the fanout with the same ordering rule the coordinator
//! uses. Envelopes are snapshots, so a device that missed intermediate
//! versions (or the original `Show`) converges on the latest one it gets.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::locks::KeyedLocks;
use crate::reaper::TombstoneReaper;
use crate::resolver::{ConflictResolver, Outcome};
use crate::transport::{EnvelopeSource, Renderer};
use chrono::{DateTime, Utc};
use notisync_storage::RecordStore;
use notisync_types::{DeviceId, Envelope, NotificationEvent, NotificationId, NotificationRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The receiving side of synchronization on one device.
pub struct DeviceReplica {
    device_id: DeviceId,
    store: Arc<dyn RecordStore>,
    locks: Arc<KeyedLocks>,
    renderer: Arc<dyn Renderer>,
    lock_timeout: Duration,
    requeue_delay: Duration,
}

impl DeviceReplica {
    /// Creates a replica for `device_id` over its local store.
    pub fn new(
        device_id: impl Into<DeviceId>,
        store: Arc<dyn RecordStore>,
        renderer: Arc<dyn Renderer>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            store,
            locks: Arc::new(KeyedLocks::new()),
            renderer,
            lock_timeout: config.lock_timeout(),
            requeue_delay: config.requeue_delay(),
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// The local copy of a notification, if any.
    pub async fn record(&self, id: &NotificationId) -> SyncResult<Option<NotificationRecord>> {
        Ok(self.store.get(id).await?)
    }

    /// Builds a reaper over the local store, sharing this replica's locks.
    pub fn reaper(&self, config: &SyncConfig) -> TombstoneReaper {
        TombstoneReaper::new(self.store.clone(), self.locks.clone(), config)
    }

    /// Applies one envelope and renders it if it wins.
    ///
    /// Rendering happens inside the per-id critical section so the platform
    /// notification is never updated out of order.
    pub async fn apply_envelope(&self, envelope: &Envelope) -> SyncResult<Outcome> {
        let _guard = self.locks.acquire(&envelope.id, self.lock_timeout).await?;

        let current = self.store.get(&envelope.id).await?;
        let outcome = ConflictResolver::resolve_snapshot(current.as_ref(), envelope, Utc::now());
        match &outcome {
            Outcome::Apply(record) => {
                self.store.put(record).await?;
                self.renderer.render(&Envelope::from(record));
                debug!(
                    "[{}] Rendered {} v{} ({})",
                    self.device_id, record.id, record.version, record.lifecycle_state
                );
            }
            Outcome::Reject(reason) => {
                debug!(
                    "[{}] Ignoring envelope {} v{}: {}",
                    self.device_id, envelope.id, envelope.version, reason
                );
            }
        }
        Ok(outcome)
    }

    /// Dismisses a notification on this device.
    ///
    /// The cancel is applied and rendered locally right away, at one version
    /// past the local record. The returned event must be forwarded to the
    /// coordinator; the fanout will not echo it back here.
    pub async fn local_cancel(
        &self,
        id: &NotificationId,
        now: DateTime<Utc>,
    ) -> SyncResult<NotificationEvent> {
        let _guard = self.locks.acquire(id, self.lock_timeout).await?;

        let current = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| SyncError::UnknownId { id: id.clone() })?;
        let version = current.version.checked_add(1).ok_or_else(|| {
            SyncError::InvalidEvent(format!("{} is at the last version {}", id, current.version))
        })?;
        let timestamp = now.max(current.timestamp);
        let event = NotificationEvent::cancel(
            id.clone(),
            version,
            timestamp,
            self.device_id.clone(),
            current.user_id.clone(),
        );

        match ConflictResolver::resolve(Some(&current), &event, now) {
            Outcome::Apply(record) => {
                self.store.put(&record).await?;
                self.renderer.render(&Envelope::from(&record));
                info!("[{}] Dismissed {} at v{}", self.device_id, id, record.version);
                Ok(event)
            }
            Outcome::Reject(reason) => Err(reason.into_error(id.clone())),
        }
    }

    /// Applies envelopes from `source` until it closes.
    ///
    /// Contended envelopes are retried after the requeue delay. A store
    /// failure skips the envelope; the transport redelivers it.
    pub async fn run<S: EnvelopeSource>(&self, mut source: S) {
        info!("[{}] Replica started", self.device_id);
        while let Some(envelope) = source.recv_envelope().await {
            loop {
                match self.apply_envelope(&envelope).await {
                    Ok(_) => break,
                    Err(SyncError::LockTimeout { .. }) => {
                        warn!("[{}] Lock contention on {}; retrying", self.device_id, envelope.id);
                        tokio::time::sleep(self.requeue_delay).await;
                    }
                    Err(e) => {
                        error!(
                            "[{}] Failed to apply {} v{}: {}",
                            self.device_id, envelope.id, envelope.version, e
                        );
                        break;
                    }
                }
            }
        }
        info!("[{}] Replica stopped", self.device_id);
    }
}
