//! Notification content carried through the sync core.
//!
//! The core never interprets content; it only stores it and forwards it in
//! envelopes. Styles form a closed set of tagged variants so a renderer can
//! dispatch over them exhaustively. Anything else the producer attaches is
//! kept in `extras` and passed through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Visual style of a notification, selected by the producer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NotificationStyle {
    /// Title and body only.
    #[default]
    Basic,

    /// Expandable long-form text.
    #[serde(rename_all = "camelCase")]
    BigText {
        /// Text shown when the notification is expanded.
        expanded_text: String,
    },

    /// Progress indicator (e.g. an order moving through fulfilment).
    #[serde(rename_all = "camelCase")]
    Progress {
        current: u32,
        max: u32,
        #[serde(default)]
        indeterminate: bool,
    },

    /// A list of short lines, newest first.
    Inbox { lines: Vec<String> },

    /// Large image attachment.
    #[serde(rename_all = "camelCase")]
    BigPicture { image_url: String },
}

/// Opaque notification payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub style: NotificationStyle,
    /// Producer-defined fields forwarded verbatim.
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl NotificationContent {
    /// Creates basic content with a title and body.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            style: NotificationStyle::Basic,
            extras: Map::new(),
        }
    }

    /// Sets the style.
    #[must_use]
    pub fn with_style(mut self, style: NotificationStyle) -> Self {
        self.style = style;
        self
    }

    /// Attaches an opaque pass-through field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }
}
