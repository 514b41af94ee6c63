//! Collaborator capabilities.
//!
//! The sync core never talks to a device registry, push network or renderer
//! directly. It consumes them through these traits so any backend can be
//! plugged in.

use crate::error::SyncResult;
use async_trait::async_trait;
use notisync_types::{DeviceId, Envelope, UserId};

/// A device belonging to a user, as reported by the device registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub device_id: DeviceId,
    pub user_id: UserId,
    /// Last reachability reported by the registry. Informational only: the
    /// transport buffers for offline devices.
    pub reachable: bool,
}

impl DeviceTarget {
    /// Creates a reachable target.
    pub fn new(device_id: impl Into<DeviceId>, user_id: impl Into<UserId>) -> Self {
        Self {
            device_id: device_id.into(),
            user_id: user_id.into(),
            reachable: true,
        }
    }

    /// Marks the target as unreachable.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }
}

/// Device registration: which devices belong to a user.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Returns the user's current device set.
    async fn resolve_devices(&self, user_id: &UserId) -> SyncResult<Vec<DeviceTarget>>;
}

/// Outbound half of the push transport (best-effort, at-least-once,
/// unordered).
#[async_trait]
pub trait EnvelopeTransport: Send + Sync {
    /// Hands one envelope to the transport for delivery to `target`.
    /// `Ok` means the transport accepted it, not that it was delivered.
    async fn publish(&self, envelope: &Envelope, target: &DeviceId) -> SyncResult<()>;
}

/// Inbound half of the push transport, as seen by one device.
#[async_trait]
pub trait EnvelopeSource: Send {
    /// Receives the next envelope from the subscription.
    /// Returns `None` when the subscription is closed.
    async fn recv_envelope(&mut self) -> Option<Envelope>;
}

/// Device-side rendering of a notification snapshot.
pub trait Renderer: Send + Sync {
    /// Brings the platform notification in line with `envelope`.
    fn render(&self, envelope: &Envelope);
}

/// In-process collaborators for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    /// A device registry backed by a fixed map.
    #[derive(Debug, Default)]
    pub struct StaticDeviceRegistry {
        devices: Mutex<HashMap<UserId, Vec<DeviceTarget>>>,
        unavailable: Mutex<bool>,
    }

    impl StaticDeviceRegistry {
        /// Creates an empty registry.
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers a reachable device for a user.
        pub fn with_device(self, user_id: &str, device_id: &str) -> Self {
            self.add(DeviceTarget::new(device_id, user_id));
            self
        }

        /// Registers a target.
        pub fn add(&self, target: DeviceTarget) {
            self.devices
                .lock()
                .unwrap()
                .entry(target.user_id.clone())
                .or_default()
                .push(target);
        }

        /// Removes a device from every user.
        pub fn remove(&self, device_id: &str) {
            for targets in self.devices.lock().unwrap().values_mut() {
                targets.retain(|t| t.device_id.as_str() != device_id);
            }
        }

        /// Makes every lookup fail until reset.
        pub fn set_unavailable(&self, unavailable: bool) {
            *self.unavailable.lock().unwrap() = unavailable;
        }
    }

    #[async_trait]
    impl DeviceRegistry for StaticDeviceRegistry {
        async fn resolve_devices(&self, user_id: &UserId) -> SyncResult<Vec<DeviceTarget>> {
            if *self.unavailable.lock().unwrap() {
                return Err(SyncError::Registry("registry offline".into()));
            }
            Ok(self
                .devices
                .lock()
                .unwrap()
                .get(user_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    /// A transport that records every accepted publish.
    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        published: Mutex<Vec<(DeviceId, Envelope)>>,
        failing: Mutex<HashSet<DeviceId>>,
        stalled: Mutex<HashSet<DeviceId>>,
    }

    impl RecordingTransport {
        /// Creates a transport that accepts everything.
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes publishes to `device` fail immediately.
        pub fn fail_device(&self, device: &str) {
            self.failing.lock().unwrap().insert(DeviceId::new(device));
        }

        /// Makes publishes to `device` never complete.
        pub fn stall_device(&self, device: &str) {
            self.stalled.lock().unwrap().insert(DeviceId::new(device));
        }

        /// All accepted publishes, in acceptance order.
        pub fn published(&self) -> Vec<(DeviceId, Envelope)> {
            self.published.lock().unwrap().clone()
        }

        /// Envelopes accepted for one device.
        pub fn published_to(&self, device: &str) -> Vec<Envelope> {
            self.published
                .lock()
                .unwrap()
                .iter()
                .filter(|(d, _)| d.as_str() == device)
                .map(|(_, e)| e.clone())
                .collect()
        }

        /// Forgets everything recorded so far.
        pub fn clear(&self) {
            self.published.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl EnvelopeTransport for RecordingTransport {
        async fn publish(&self, envelope: &Envelope, target: &DeviceId) -> SyncResult<()> {
            let stalled = self.stalled.lock().unwrap().contains(target);
            if stalled {
                std::future::pending::<()>().await;
            }
            if self.failing.lock().unwrap().contains(target) {
                return Err(SyncError::TargetUnreachable {
                    device: target.clone(),
                    reason: "connection refused".into(),
                });
            }
            self.published
                .lock()
                .unwrap()
                .push((target.clone(), envelope.clone()));
            Ok(())
        }
    }

    /// An in-process push network: every device gets its own inbox.
    #[derive(Debug, Default, Clone)]
    pub struct MemoryBus {
        inboxes: Arc<Mutex<HashMap<DeviceId, mpsc::UnboundedSender<Envelope>>>>,
    }

    impl MemoryBus {
        /// Creates a bus with no subscribers.
        pub fn new() -> Self {
            Self::default()
        }

        /// Subscribes a device, replacing any previous subscription.
        pub fn subscribe(&self, device: &str) -> ChannelSource {
            let (tx, rx) = mpsc::unbounded_channel();
            self.inboxes.lock().unwrap().insert(DeviceId::new(device), tx);
            ChannelSource::new(rx)
        }

        /// Drops a device's subscription, closing its source.
        pub fn unsubscribe(&self, device: &str) {
            self.inboxes.lock().unwrap().remove(device);
        }
    }

    #[async_trait]
    impl EnvelopeTransport for MemoryBus {
        async fn publish(&self, envelope: &Envelope, target: &DeviceId) -> SyncResult<()> {
            let inboxes = self.inboxes.lock().unwrap();
            let tx = inboxes.get(target).ok_or_else(|| SyncError::TargetUnreachable {
                device: target.clone(),
                reason: "no subscriber".into(),
            })?;
            tx.send(envelope.clone()).map_err(|_| SyncError::TargetUnreachable {
                device: target.clone(),
                reason: "subscriber closed".into(),
            })
        }
    }

    /// An envelope source fed by a channel.
    #[derive(Debug)]
    pub struct ChannelSource {
        rx: mpsc::UnboundedReceiver<Envelope>,
    }

    impl ChannelSource {
        pub fn new(rx: mpsc::UnboundedReceiver<Envelope>) -> Self {
            Self { rx }
        }

        /// Creates a source together with the sender that feeds it.
        pub fn pair() -> (mpsc::UnboundedSender<Envelope>, Self) {
            let (tx, rx) = mpsc::unbounded_channel();
            (tx, Self::new(rx))
        }
    }

    #[async_trait]
    impl EnvelopeSource for ChannelSource {
        async fn recv_envelope(&mut self) -> Option<Envelope> {
            self.rx.recv().await
        }
    }

    /// A renderer that records what it was asked to render.
    #[derive(Debug, Default)]
    pub struct RecordingRenderer {
        rendered: Mutex<Vec<Envelope>>,
    }

    impl RecordingRenderer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Everything rendered so far, in order.
        pub fn rendered(&self) -> Vec<Envelope> {
            self.rendered.lock().unwrap().clone()
        }
    }

    impl Renderer for RecordingRenderer {
        fn render(&self, envelope: &Envelope) {
            self.rendered.lock().unwrap().push(envelope.clone());
        }
    }
}
