//! Fanout of accepted state changes to a user's devices.
//!
//! One envelope per target, published concurrently after the per-id
//! critical section has been released. Each publish has its own timeout and
//! its own failure: an unreachable device never delays or blocks the rest.
//! Retrying a failed target is the transport's job, not ours.

use crate::echo::EchoGuard;
use crate::error::{SyncError, SyncResult};
use crate::resolver::Outcome;
use crate::transport::{DeviceRegistry, EnvelopeTransport};
use futures::future::join_all;
use notisync_types::{DeviceId, Envelope, NotificationEvent, NotificationId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened to each target of one dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// The notification dispatched (unset for rejected outcomes).
    pub id: Option<NotificationId>,
    /// Targets whose publish the transport accepted.
    pub delivered: Vec<DeviceId>,
    /// Targets skipped by the echo guard.
    pub suppressed: Vec<DeviceId>,
    /// Targets whose publish failed or timed out.
    pub failed: Vec<(DeviceId, SyncError)>,
}

impl DispatchReport {
    /// Number of publishes attempted.
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Publishes envelopes for applied outcomes.
pub struct FanoutDispatcher {
    registry: Arc<dyn DeviceRegistry>,
    transport: Arc<dyn EnvelopeTransport>,
    publish_timeout: Duration,
}

impl FanoutDispatcher {
    /// Creates a dispatcher.
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        transport: Arc<dyn EnvelopeTransport>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            publish_timeout,
        }
    }

    /// Publishes the snapshot of an applied outcome to every device of the
    /// record's owner, except where the echo guard suppresses it.
    ///
    /// Rejected outcomes dispatch nothing. Per-target failures are collected
    /// in the report; only a failed device lookup is returned as an error.
    pub async fn dispatch(
        &self,
        outcome: &Outcome,
        event: &NotificationEvent,
    ) -> SyncResult<DispatchReport> {
        let Some(record) = outcome.record() else {
            return Ok(DispatchReport::default());
        };

        let targets = self.registry.resolve_devices(&record.user_id).await?;
        let envelope = Envelope::from(record);

        let mut report = DispatchReport {
            id: Some(record.id.clone()),
            ..Default::default()
        };
        let mut seen = HashSet::new();
        let mut pending = Vec::new();

        for target in targets {
            if !seen.insert(target.device_id.clone()) {
                continue;
            }
            if !EchoGuard::should_notify(&target.device_id, outcome, event) {
                debug!("Suppressing echo of {} to origin {}", record.id, target.device_id);
                report.suppressed.push(target.device_id);
                continue;
            }
            if !target.reachable {
                debug!("Target {} last seen offline; handing to transport anyway", target.device_id);
            }
            pending.push(self.publish_one(&envelope, target.device_id));
        }

        for (device, result) in join_all(pending).await {
            match result {
                Ok(()) => report.delivered.push(device),
                Err(e) => {
                    warn!("Publish of {} v{} to {} failed: {}", envelope.id, envelope.version, device, e);
                    report.failed.push((device, e));
                }
            }
        }

        info!(
            "Dispatched {} v{} ({}): {} delivered, {} suppressed, {} failed",
            envelope.id,
            envelope.version,
            envelope.lifecycle_state,
            report.delivered.len(),
            report.suppressed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn publish_one(&self, envelope: &Envelope, device: DeviceId) -> (DeviceId, SyncResult<()>) {
        let result = match tokio::time::timeout(
            self.publish_timeout,
            self.transport.publish(envelope, &device),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e @ SyncError::TargetUnreachable { .. })) => Err(e),
            Ok(Err(e)) => Err(SyncError::TargetUnreachable {
                device: device.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(SyncError::TargetUnreachable {
                device: device.clone(),
                reason: format!("publish timed out after {:?}", self.publish_timeout),
            }),
        };
        (device, result)
    }
}
