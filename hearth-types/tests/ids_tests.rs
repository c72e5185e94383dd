use hearth_types::{Error, RoomId, UserId};

// ── RoomId ───────────────────────────────────────────────────────

#[test]
fn room_ids_are_unique() {
    assert_ne!(RoomId::new(), RoomId::new());
}

#[test]
fn room_id_display_parse_round_trip() {
    let id = RoomId::new();
    let parsed = RoomId::parse(&id.to_string()).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn room_id_rejects_garbage() {
    assert!(RoomId::parse("not-a-uuid").is_err());
}

#[test]
fn room_id_nil_detection() {
    let nil = RoomId::from_uuid(uuid::Uuid::nil());
    assert!(nil.is_nil());
    assert!(!RoomId::new().is_nil());
}

#[test]
fn room_id_serde_transparent() {
    let id = RoomId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
}

// ── UserId ───────────────────────────────────────────────────────

#[test]
fn user_id_new_builds_full_form() {
    let id = UserId::new("alice", "example.org").unwrap();
    assert_eq!(id.as_str(), "@alice:example.org");
    assert_eq!(id.local_part(), "alice");
    assert_eq!(id.server(), "example.org");
}

#[test]
fn user_id_new_strips_scheme() {
    let https = UserId::new("alice", "https://example.org").unwrap();
    let http = UserId::new("alice", "http://example.org").unwrap();
    let bare = UserId::new("alice", "example.org").unwrap();

    assert_eq!(https, bare);
    assert_eq!(http, bare);
}

#[test]
fn user_id_new_rejects_empty_parts() {
    assert!(matches!(
        UserId::new("", "example.org"),
        Err(Error::InvalidUserId(_))
    ));
    assert!(matches!(
        UserId::new("alice", ""),
        Err(Error::InvalidUserId(_))
    ));
    assert!(matches!(
        UserId::new("alice", "https://"),
        Err(Error::InvalidUserId(_))
    ));
}

#[test]
fn user_id_new_rejects_reserved_chars() {
    assert!(UserId::new("al@ce", "example.org").is_err());
    assert!(UserId::new("al:ce", "example.org").is_err());
}

#[test]
fn user_id_parse_round_trip() {
    let id = UserId::parse("@bob:hearth.dev").unwrap();
    assert_eq!(id.local_part(), "bob");
    assert_eq!(id.server(), "hearth.dev");
}

#[test]
fn user_id_parse_rejects_malformed() {
    assert!(UserId::parse("bob:hearth.dev").is_err());
    assert!(UserId::parse("@bob").is_err());
    assert!(UserId::parse("@:hearth.dev").is_err());
    assert!(UserId::parse("@bob:").is_err());
}
