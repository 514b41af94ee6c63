//! Cross-device notification state synchronization.
//!
//! Keeps the lifecycle of a logical notification (shown, updated,
//! cancelled) consistent across all devices of a user, over a transport that
//! is unordered, at-least-once and best-effort.
//!
//! # Architecture
//!
//! Every replica (the coordinator and each device) runs the same
//! deterministic conflict resolution over `(version, timestamp)`. Stale,
//! duplicate and post-purge events are dropped, so replaying the transport is
//! always safe.
//!
//! ## Components
//!
//! - **Resolver**: Decides whether an event advances a record
//! - **Echo guard**: Keeps the originating device out of the fanout
//! - **Fanout**: Publishes snapshots to every other device of the user
//! - **Reaper**: Turns expired cancellations into tombstones, then deletes them
//! - **Coordinator**: Serializes read-resolve-commit per notification id
//! - **Replica**: Applies snapshots on a device and drives its renderer
//!
//! ## Event Flow
//!
//! 1. **Validate**: Reject malformed events before any lock is taken
//! 2. **Lock**: Enter the critical section for the notification id
//! 3. **Resolve**: Compare against the stored record
//! 4. **Commit**: Persist the new record and leave the critical section
//! 5. **Dispatch**: Publish one envelope per device, skipping the origin
//!
//! # Example
//!
//! ```
//! use notisync_storage::MemoryRecordStore;
//! use notisync_sync::transport::mock::{RecordingTransport, StaticDeviceRegistry};
//! use notisync_sync::{create_coordinator, SyncConfig};
//! use std::sync::Arc;
//!
//! let registry = StaticDeviceRegistry::new()
//!     .with_device("user-1", "phone")
//!     .with_device("user-1", "watch");
//!
//! let (handle, events, commands, coordinator) = create_coordinator(
//!     Arc::new(MemoryRecordStore::new()),
//!     Arc::new(registry),
//!     Arc::new(RecordingTransport::new()),
//!     SyncConfig::default(),
//! );
//! ```

mod config;
mod coordinator;
pub mod echo;
mod error;
pub mod fanout;
pub mod locks;
pub mod reaper;
pub mod replica;
pub mod resolver;
pub mod transport;

pub use config::{SyncConfig, DEFAULT_RETENTION_WINDOW_SECS, DEFAULT_TOMBSTONE_RETENTION_SECS};
pub use coordinator::{
    create_coordinator, CoordinatorCommand, CoordinatorEvent, CoordinatorHandle,
    EventDisposition, SyncCoordinator,
};
pub use echo::EchoGuard;
pub use error::{SyncError, SyncResult};
pub use fanout::{DispatchReport, FanoutDispatcher};
pub use locks::{KeyGuard, KeyedLocks};
pub use reaper::{ReapReport, ReaperHandle, TombstoneReaper};
pub use replica::DeviceReplica;
pub use resolver::{ConflictResolver, Outcome, RejectReason};
pub use transport::{DeviceRegistry, DeviceTarget, EnvelopeSource, EnvelopeTransport, Renderer};
