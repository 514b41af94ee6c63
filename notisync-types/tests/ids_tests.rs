use notisync_types::{DeviceId, NotificationId, UserId};
use std::collections::HashSet;
use std::str::FromStr;

// ── NotificationId ────────────────────────────────────────────────

#[test]
fn generated_ids_are_unique() {
    let a = NotificationId::generate();
    let b = NotificationId::generate();
    assert_ne!(a, b);
}

#[test]
fn generated_ids_are_uuids() {
    let id = NotificationId::generate();
    assert!(uuid::Uuid::parse_str(id.as_str()).is_ok());
}

#[test]
fn foreign_ids_are_accepted_verbatim() {
    let id = NotificationId::from("order-1234");
    assert_eq!(id.as_str(), "order-1234");
    assert_eq!(id.to_string(), "order-1234");
}

#[test]
fn from_str_roundtrip() {
    let id = NotificationId::from_str("o1").unwrap();
    assert_eq!(id, NotificationId::new("o1"));
}

#[test]
fn blank_id_is_empty() {
    assert!(NotificationId::new("").is_empty());
    assert!(NotificationId::new("   ").is_empty());
    assert!(!NotificationId::new("o1").is_empty());
}

#[test]
fn serde_is_transparent() {
    let id = NotificationId::new("o1");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, r#""o1""#);
    let parsed: NotificationId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn hash_and_eq() {
    let mut set = HashSet::new();
    set.insert(NotificationId::new("o1"));
    set.insert(NotificationId::new("o1"));
    assert_eq!(set.len(), 1);
}

// ── DeviceId / UserId ─────────────────────────────────────────────

#[test]
fn device_id_display() {
    let id = DeviceId::new("phone-a");
    assert_eq!(format!("{id}"), "phone-a");
}

#[test]
fn device_id_lookup_by_str() {
    let mut set = HashSet::new();
    set.insert(DeviceId::new("tablet"));
    assert!(set.contains("tablet"));
}

#[test]
fn user_id_from_string() {
    let id = UserId::from(String::from("u-42"));
    assert_eq!(id.as_str(), "u-42");
}
