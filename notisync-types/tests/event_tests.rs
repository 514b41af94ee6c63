use chrono::{Duration, TimeZone, Utc};
use notisync_types::{
    Error, EventKind, NotificationContent, NotificationEvent, NotificationStyle, OrderKey,
};
use pretty_assertions::assert_eq;

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

// ── OrderKey ──────────────────────────────────────────────────────

#[test]
fn higher_version_wins_regardless_of_timestamp() {
    let older_clock = OrderKey::new(2, t0());
    let newer_clock = OrderKey::new(1, t0() + Duration::hours(1));
    assert!(older_clock > newer_clock);
}

#[test]
fn equal_version_breaks_tie_on_timestamp() {
    let a = OrderKey::new(3, t0());
    let b = OrderKey::new(3, t0() + Duration::milliseconds(1));
    assert!(b > a);
}

#[test]
fn identical_keys_are_equal() {
    assert_eq!(OrderKey::new(3, t0()), OrderKey::new(3, t0()));
}

// ── Constructors ──────────────────────────────────────────────────

#[test]
fn show_carries_content() {
    let ev = NotificationEvent::show("o1", 1, t0(), "A", "u1", NotificationContent::new("Order", "Processing"));
    assert_eq!(ev.kind, EventKind::Show);
    assert_eq!(ev.content.unwrap().body, "Processing");
}

#[test]
fn cancel_has_no_content() {
    let ev = NotificationEvent::cancel("o1", 3, t0(), "B", "u1");
    assert_eq!(ev.kind, EventKind::Cancel);
    assert!(ev.content.is_none());
}

// ── Validation ────────────────────────────────────────────────────

#[test]
fn version_zero_is_invalid() {
    let ev = NotificationEvent::cancel("o1", 0, t0(), "B", "u1");
    assert!(matches!(ev.validate(), Err(Error::InvalidEvent(_))));
}

#[test]
fn version_must_fit_a_signed_column() {
    let top = NotificationEvent::cancel("o1", NotificationEvent::MAX_VERSION, t0(), "B", "u1");
    assert!(top.validate().is_ok());

    let over = NotificationEvent::cancel("o1", NotificationEvent::MAX_VERSION + 1, t0(), "B", "u1");
    assert!(matches!(over.validate(), Err(Error::InvalidEvent(_))));
    let max = NotificationEvent::cancel("o1", u64::MAX, t0(), "B", "u1");
    assert!(matches!(max.validate(), Err(Error::InvalidEvent(_))));
}

#[test]
fn empty_id_is_invalid() {
    let ev = NotificationEvent::cancel("", 1, t0(), "B", "u1");
    assert!(matches!(ev.validate(), Err(Error::InvalidEvent(_))));
}

#[test]
fn empty_user_is_invalid() {
    let ev = NotificationEvent::cancel("o1", 1, t0(), "B", "");
    assert!(ev.validate().is_err());
}

// ── Wire format ───────────────────────────────────────────────────

#[test]
fn parses_wire_shape() {
    let json = r#"{
        "id": "o1",
        "kind": "Update",
        "version": 2,
        "timestamp": "2026-03-01T12:00:00Z",
        "originDeviceId": "backend",
        "userId": "u1",
        "content": {
            "title": "Order",
            "body": "Shipped",
            "style": { "kind": "progress", "current": 2, "max": 3 },
            "trackingUrl": "https://example.test/t/1"
        }
    }"#;
    let ev = NotificationEvent::from_json(json).unwrap();
    assert_eq!(ev.kind, EventKind::Update);
    assert_eq!(ev.timestamp, t0());
    assert_eq!(ev.origin_device_id.as_str(), "backend");

    let content = ev.content.unwrap();
    assert_eq!(
        content.style,
        NotificationStyle::Progress { current: 2, max: 3, indeterminate: false }
    );
    assert_eq!(content.extras["trackingUrl"], "https://example.test/t/1");
}

#[test]
fn content_is_optional_on_the_wire() {
    let json = r#"{"id":"o1","kind":"Cancel","version":3,"timestamp":"2026-03-01T12:00:00Z","originDeviceId":"B","userId":"u1"}"#;
    let ev = NotificationEvent::from_json(json).unwrap();
    assert!(ev.content.is_none());
}

#[test]
fn from_json_rejects_version_zero() {
    let json = r#"{"id":"o1","kind":"Show","version":0,"timestamp":"2026-03-01T12:00:00Z","originDeviceId":"A","userId":"u1"}"#;
    assert!(matches!(NotificationEvent::from_json(json), Err(Error::InvalidEvent(_))));
}

#[test]
fn from_json_rejects_unknown_kind() {
    let json = r#"{"id":"o1","kind":"Snooze","version":1,"timestamp":"2026-03-01T12:00:00Z","originDeviceId":"A","userId":"u1"}"#;
    assert!(matches!(NotificationEvent::from_json(json), Err(Error::Serialization(_))));
}

#[test]
fn serialized_event_uses_camel_case() {
    let ev = NotificationEvent::cancel("o1", 3, t0(), "B", "u1");
    let value = serde_json::to_value(&ev).unwrap();
    assert_eq!(value["originDeviceId"], "B");
    assert_eq!(value["userId"], "u1");
    assert!(value.get("content").is_none());
}

#[test]
fn style_defaults_to_basic() {
    let content: NotificationContent = serde_json::from_str(r#"{"title":"t","body":"b"}"#).unwrap();
    assert_eq!(content.style, NotificationStyle::Basic);
    assert!(content.extras.is_empty());
    assert_eq!(NotificationStyle::default(), NotificationStyle::Basic);
    assert_eq!(NotificationContent::default().style, NotificationStyle::Basic);
}
