use chrono::{Duration, TimeZone, Utc};
use notisync_types::{
    Envelope, EventKind, LifecycleState, NotificationContent, NotificationRecord,
};

fn record(state: LifecycleState) -> NotificationRecord {
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    NotificationRecord {
        id: "o1".into(),
        version: 3,
        timestamp: t0,
        lifecycle_state: state,
        origin_device_id: "B".into(),
        user_id: "u1".into(),
        content: Some(NotificationContent::new("Order", "Shipped")),
        cancelled_at: Some(t0 + Duration::seconds(5)),
        purged_at: None,
    }
}

// ── LifecycleState ────────────────────────────────────────────────

#[test]
fn only_purged_is_terminal() {
    assert!(LifecycleState::Purged.is_terminal());
    assert!(!LifecycleState::Cancelled.is_terminal());
    assert!(!LifecycleState::Shown.is_terminal());
}

#[test]
fn live_states() {
    assert!(LifecycleState::Shown.is_live());
    assert!(LifecycleState::Updated.is_live());
    assert!(!LifecycleState::Cancelled.is_live());
}

#[test]
fn state_string_roundtrip() {
    for state in [
        LifecycleState::Shown,
        LifecycleState::Updated,
        LifecycleState::Cancelled,
        LifecycleState::Purged,
    ] {
        assert_eq!(state.as_str().parse::<LifecycleState>().unwrap(), state);
    }
}

#[test]
fn unknown_state_string_fails() {
    assert!("Dismissed".parse::<LifecycleState>().is_err());
}

// ── Tombstones ────────────────────────────────────────────────────

#[test]
fn tombstone_drops_content_but_keeps_ordering() {
    let cancelled = record(LifecycleState::Cancelled);
    let key = cancelled.order_key();
    let purged_at = cancelled.timestamp + Duration::days(1);

    let tomb = cancelled.into_tombstone(purged_at);
    assert!(tomb.is_tombstone());
    assert!(tomb.content.is_none());
    assert_eq!(tomb.order_key(), key);
    assert_eq!(tomb.purged_at, Some(purged_at));
    assert!(tomb.cancelled_at.is_some());
}

// ── Envelope ──────────────────────────────────────────────────────

#[test]
fn envelope_snapshots_record() {
    let rec = record(LifecycleState::Updated);
    let env = Envelope::from(&rec);
    assert_eq!(env.id, rec.id);
    assert_eq!(env.version, 3);
    assert_eq!(env.lifecycle_state, LifecycleState::Updated);
    assert_eq!(env.content, rec.content);
}

#[test]
fn envelope_wire_shape_has_state_but_no_kind() {
    let env = Envelope::from(&record(LifecycleState::Cancelled));
    let value = serde_json::to_value(&env).unwrap();
    assert_eq!(value["lifecycleState"], "Cancelled");
    assert!(value.get("kind").is_none());
    assert!(value.get("cancelledAt").is_none());
}

#[test]
fn envelope_implies_event_kind() {
    assert_eq!(Envelope::from(&record(LifecycleState::Shown)).implied_kind(), EventKind::Show);
    assert_eq!(Envelope::from(&record(LifecycleState::Updated)).implied_kind(), EventKind::Update);
    assert_eq!(Envelope::from(&record(LifecycleState::Cancelled)).implied_kind(), EventKind::Cancel);
}

#[test]
fn envelope_to_event_preserves_ordering_key() {
    let env = Envelope::from(&record(LifecycleState::Updated));
    let ev = env.to_event();
    assert_eq!(ev.order_key(), env.order_key());
    assert_eq!(ev.origin_device_id.as_str(), "B");
}
