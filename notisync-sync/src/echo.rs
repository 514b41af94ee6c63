//! Echo suppression.
//!
//! The device that originated an action already reflects it locally. Sending
//! it the resulting snapshot would be a redundant instruction that can cause
//! a visible flicker or a duplicate side effect.

use crate::resolver::Outcome;
use notisync_types::{DeviceId, NotificationEvent};

/// Decides whether a target should receive the envelope for an outcome.
pub struct EchoGuard;

impl EchoGuard {
    /// Returns false for the event's originating device, and for rejected
    /// outcomes (there is nothing to deliver).
    pub fn should_notify(target: &DeviceId, outcome: &Outcome, event: &NotificationEvent) -> bool {
        outcome.is_apply() && *target != event.origin_device_id
    }
}
