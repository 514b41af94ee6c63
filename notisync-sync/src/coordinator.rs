//! Synchronization coordinator.
//!
//! Drives each inbound event through read → resolve → commit → dispatch:
//!
//! ```text
//!   Absent ──Show──▶ Shown ──Update/Show──▶ Updated ──Cancel──▶ Cancelled ──reaper──▶ Purged
//!                      │                      ▲  │                  ▲
//!                      └──────Cancel──────────┼──┘──────────────────┘
//! ```
//!
//! The read and the commit happen inside the per-id critical section; the
//! fanout happens after it is released. Rejected events never change state
//! and are dropped, which keeps at-least-once redelivery safe end to end.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::fanout::{DispatchReport, FanoutDispatcher};
use crate::locks::KeyedLocks;
use crate::reaper::TombstoneReaper;
use crate::resolver::{ConflictResolver, Outcome, RejectReason};
use crate::transport::{DeviceRegistry, EnvelopeTransport};
use chrono::Utc;
use notisync_storage::RecordStore;
use notisync_types::{
    DeviceId, LifecycleState, NotificationEvent, NotificationId, NotificationRecord,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Commands accepted by the coordinator loop.
#[derive(Debug)]
pub enum CoordinatorCommand {
    /// Process an inbound event. `attempt` counts requeues after lock
    /// contention or a store failure.
    Submit { event: NotificationEvent, attempt: u32 },
    /// Stop the loop. Events already spawned run to completion.
    Shutdown,
}

/// Signals emitted by the coordinator for operators and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    /// An event was committed and dispatched.
    Applied {
        id: NotificationId,
        version: u64,
        state: LifecycleState,
        delivered: usize,
        failed: usize,
    },
    /// An event was rejected by conflict resolution.
    Dropped {
        id: NotificationId,
        reason: RejectReason,
    },
    /// An event hit lock contention or a store failure and was resubmitted.
    Requeued { id: NotificationId, attempt: u32 },
    /// One dispatch target failed.
    TargetUnreachable {
        id: NotificationId,
        device: DeviceId,
        reason: String,
    },
    /// The record store failed; the event was not committed. The run loop
    /// resubmits it with backoff until the store recovers.
    StoreUnavailable { id: NotificationId, error: String },
    /// The event was malformed and discarded.
    Invalid { id: NotificationId, error: String },
}

/// What happened to one event.
#[derive(Debug)]
pub enum EventDisposition {
    /// Committed; carries the new record and the fanout report.
    Applied {
        record: NotificationRecord,
        report: DispatchReport,
    },
    /// Rejected without any state change.
    Dropped(RejectReason),
}

impl EventDisposition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Applied { .. } => None,
            Self::Dropped(reason) => Some(*reason),
        }
    }
}

/// Handle to send commands to the coordinator loop.
#[derive(Clone)]
pub struct CoordinatorHandle {
    command_tx: mpsc::Sender<CoordinatorCommand>,
}

impl CoordinatorHandle {
    /// Queues an inbound event.
    pub async fn submit(&self, event: NotificationEvent) -> SyncResult<()> {
        self.command_tx
            .send(CoordinatorCommand::Submit { event, attempt: 0 })
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Stops the coordinator loop.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.command_tx
            .send(CoordinatorCommand::Shutdown)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }
}

/// The synchronization coordinator.
pub struct SyncCoordinator {
    store: Arc<dyn RecordStore>,
    locks: Arc<KeyedLocks>,
    dispatcher: FanoutDispatcher,
    config: SyncConfig,
    event_tx: mpsc::Sender<CoordinatorEvent>,
    /// Weak so that dropping every handle ends the loop.
    requeue_tx: mpsc::WeakSender<CoordinatorCommand>,
}

impl SyncCoordinator {
    /// The configuration in use.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The per-id lock table shared with the reaper.
    pub fn locks(&self) -> &Arc<KeyedLocks> {
        &self.locks
    }

    /// The record store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Builds a reaper over this coordinator's store and lock table.
    pub fn reaper(&self) -> TombstoneReaper {
        TombstoneReaper::new(self.store.clone(), self.locks.clone(), &self.config)
    }

    /// Processes one event to completion.
    ///
    /// Rejections are returned as `Ok(EventDisposition::Dropped)`. `Err` is
    /// reserved for conditions the caller must act on: `StoreUnavailable`
    /// (redeliver), `LockTimeout` (requeue) and `InvalidEvent` (discard).
    /// [`run`](Self::run) does the redelivery and requeueing itself.
    pub async fn handle_event(&self, event: &NotificationEvent) -> SyncResult<EventDisposition> {
        event.validate()?;

        let (outcome, record) = {
            let _guard = self
                .locks
                .acquire(&event.id, self.config.lock_timeout())
                .await?;

            let current = self.store.get(&event.id).await?;
            let outcome = ConflictResolver::resolve(current.as_ref(), event, Utc::now());
            let record = match &outcome {
                Outcome::Apply(record) => record.clone(),
                Outcome::Reject(reason) => {
                    debug!(
                        "Dropping {} {} v{} from {}: {}",
                        event.kind, event.id, event.version, event.origin_device_id, reason
                    );
                    return Ok(EventDisposition::Dropped(*reason));
                }
            };
            self.store.put(&record).await?;
            (outcome, record)
        };

        info!(
            "Applied {} {} v{} -> {}",
            event.kind, record.id, record.version, record.lifecycle_state
        );

        let report = match self.dispatcher.dispatch(&outcome, event).await {
            Ok(report) => report,
            Err(e) => {
                error!("Fanout of {} v{} failed: {}", record.id, record.version, e);
                DispatchReport {
                    id: Some(record.id.clone()),
                    ..Default::default()
                }
            }
        };

        Ok(EventDisposition::Applied { record, report })
    }

    /// Runs the command loop until `Shutdown` or until every handle is dropped.
    ///
    /// Each event runs on its own task: events for different ids proceed in
    /// parallel, events for the same id serialize on the per-id lock.
    pub async fn run(self: Arc<Self>, mut command_rx: mpsc::Receiver<CoordinatorCommand>) {
        info!("Coordinator started");
        while let Some(cmd) = command_rx.recv().await {
            match cmd {
                CoordinatorCommand::Shutdown => {
                    info!("Coordinator shutting down");
                    break;
                }
                CoordinatorCommand::Submit { event, attempt } => {
                    let this = self.clone();
                    tokio::spawn(async move { this.process(event, attempt).await });
                }
            }
        }
    }

    async fn process(&self, event: NotificationEvent, attempt: u32) {
        let id = event.id.clone();
        match self.handle_event(&event).await {
            Ok(EventDisposition::Applied { record, report }) => {
                for (device, e) in &report.failed {
                    self.emit(CoordinatorEvent::TargetUnreachable {
                        id: id.clone(),
                        device: device.clone(),
                        reason: e.to_string(),
                    });
                }
                self.emit(CoordinatorEvent::Applied {
                    id,
                    version: record.version,
                    state: record.lifecycle_state,
                    delivered: report.delivered.len(),
                    failed: report.failed.len(),
                });
            }
            Ok(EventDisposition::Dropped(reason)) => {
                self.emit(CoordinatorEvent::Dropped { id, reason });
            }
            Err(SyncError::LockTimeout { .. }) => {
                let attempt = attempt.saturating_add(1);
                warn!("Lock contention on {}; requeueing (attempt {})", id, attempt);
                self.requeue(event, attempt, self.config.requeue_delay()).await;
            }
            Err(e @ SyncError::StoreUnavailable(_)) => {
                let attempt = attempt.saturating_add(1);
                let delay = self.config.store_retry_delay(attempt);
                error!(
                    "Record store unavailable for {}: {}; retrying in {:?} (attempt {})",
                    id, e, delay, attempt
                );
                self.emit(CoordinatorEvent::StoreUnavailable {
                    id,
                    error: e.to_string(),
                });
                self.requeue(event, attempt, delay).await;
            }
            Err(e) => {
                warn!("Discarding event for {}: {}", id, e);
                self.emit(CoordinatorEvent::Invalid {
                    id,
                    error: e.to_string(),
                });
            }
        }
    }

    async fn requeue(&self, event: NotificationEvent, attempt: u32, delay: Duration) {
        let id = event.id.clone();
        tokio::time::sleep(delay).await;

        let Some(tx) = self.requeue_tx.upgrade() else {
            warn!("Coordinator stopped; event for {} left to redelivery", id);
            return;
        };
        if tx
            .send(CoordinatorCommand::Submit { event, attempt })
            .await
            .is_err()
        {
            warn!("Coordinator stopped; event for {} left to redelivery", id);
            return;
        }
        self.emit(CoordinatorEvent::Requeued { id, attempt });
    }

    fn emit(&self, event: CoordinatorEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            debug!("Coordinator event not delivered: {}", e);
        }
    }
}

/// Creates a coordinator and the channels that drive it.
///
/// Returns the command handle, the operator event stream, the command
/// receiver to pass to [`SyncCoordinator::run`], and the coordinator itself.
pub fn create_coordinator(
    store: Arc<dyn RecordStore>,
    registry: Arc<dyn DeviceRegistry>,
    transport: Arc<dyn EnvelopeTransport>,
    config: SyncConfig,
) -> (
    CoordinatorHandle,
    mpsc::Receiver<CoordinatorEvent>,
    mpsc::Receiver<CoordinatorCommand>,
    Arc<SyncCoordinator>,
) {
    let capacity = config.channel_capacity.max(1);
    let (command_tx, command_rx) = mpsc::channel(capacity);
    let (event_tx, event_rx) = mpsc::channel(capacity);

    let dispatcher = FanoutDispatcher::new(registry, transport, config.publish_timeout());
    let coordinator = Arc::new(SyncCoordinator {
        store,
        locks: Arc::new(KeyedLocks::new()),
        dispatcher,
        config,
        event_tx,
        requeue_tx: command_tx.downgrade(),
    });

    let handle = CoordinatorHandle { command_tx };
    (handle, event_rx, command_rx, coordinator)
}
