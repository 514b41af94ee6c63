#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use notisync_types::{NotificationContent, NotificationEvent};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Installs a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A fixed instant `secs` seconds past the test epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
}

pub fn content(title: &str) -> NotificationContent {
    NotificationContent::new(title, format!("{title} body"))
}

pub fn show(id: &str, version: u64, origin: &str) -> NotificationEvent {
    NotificationEvent::show(id, version, at(version as i64), origin, "u1", content("Order"))
}

pub fn update(id: &str, version: u64, origin: &str, title: &str) -> NotificationEvent {
    NotificationEvent::update(id, version, at(version as i64), origin, "u1", content(title))
}

pub fn cancel(id: &str, version: u64, origin: &str) -> NotificationEvent {
    NotificationEvent::cancel(id, version, at(version as i64), origin, "u1")
}
