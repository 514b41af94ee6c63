//! Core type definitions for the notification sync core.
//!
//! This crate defines the plugin-agnostic types shared by every layer:
//! - Notification, device and user identifiers
//! - Inbound lifecycle events and their ordering key
//! - The per-notification synchronization record
//! - Outbound envelopes and opaque notification content
//!
//! Rendering-specific types belong to the rendering collaborator, not here.

mod content;
mod envelope;
mod event;
mod ids;
mod record;

pub use content::{NotificationContent, NotificationStyle};
pub use envelope::Envelope;
pub use event::{EventKind, NotificationEvent, OrderKey};
pub use ids::{DeviceId, NotificationId, UserId};
pub use record::{LifecycleState, NotificationRecord};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("invalid lifecycle state: {0}")]
    InvalidState(String),
}
