mod common;

use common::*;
use hearth_db::{ConnectStatus, DbError, Federation};
use hearth_types::{CollectionKey, NewRoomDescriptor};
use std::sync::Arc;

// ── room table ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn get_room_returns_none_for_unknown() {
    let TestDb { db, .. } = logged_in_db().await;
    assert!(db.get_room(CollectionKey::Notes, "nope").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn get_or_set_room_registers_once() {
    let TestDb { db, .. } = logged_in_db().await;

    let room = db
        .get_or_set_room(CollectionKey::Notes, "shared")
        .await
        .unwrap();
    let again = db
        .get_or_set_room(CollectionKey::Notes, "shared")
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&room, &again));
    assert_eq!(db.rooms(CollectionKey::Notes).await.len(), 1);
    assert_eq!(room.status(), ConnectStatus::Initial);
}

#[tokio::test(start_paused = true)]
async fn get_or_set_room_requires_login() {
    let TestDb { db, .. } = test_db();
    assert!(matches!(
        db.get_or_set_room(CollectionKey::Notes, "x").await.unwrap_err(),
        DbError::NotLoggedIn
    ));
}

// ── load ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn load_connects_every_record() {
    let TestDb { db, mocks } = logged_in_db().await;
    let records = vec![
        record_with_token(CollectionKey::Notes, "a"),
        record_with_token(CollectionKey::Notes, "b"),
        record_without_token(CollectionKey::Flashcards, "c"),
    ];

    let rooms = db.load(&records).await.unwrap();

    assert_eq!(rooms.len(), 3);
    assert_eq!(mocks.local.attachments(), 3);
    assert_eq!(db.rooms(CollectionKey::Notes).await.len(), 2);
    assert_eq!(db.rooms(CollectionKey::Flashcards).await.len(), 1);
    for room in rooms.iter().take(2) {
        let room = room.clone();
        wait_until(move || room.status() == ConnectStatus::Connected).await;
    }
}

// ── create_and_connect_room ──────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn create_and_connect_room_builds_and_registers() {
    let TestDb { db, mocks } = logged_in_db().await;
    db.connect_registry().await.unwrap();

    let room = db
        .create_and_connect_room(
            NewRoomDescriptor::new(CollectionKey::Notes, "Groceries").with_seed("groceries"),
        )
        .await
        .unwrap();
    wait_until(|| room.status() == ConnectStatus::Connected).await;

    assert_eq!(room.collection_key, CollectionKey::Notes);
    assert_eq!(room.name(), "Groceries");
    assert!(room.token().is_some());

    // recorded in the registry directory
    let directory = db.registry_directory().await.unwrap();
    let entry = directory.notes.get("groceries").unwrap();
    assert_eq!(entry.room_id, Some(room.id));
    assert!(mocks.federation.room_count() >= 2);
}

#[tokio::test(start_paused = true)]
async fn create_and_connect_room_mints_a_seed_when_absent() {
    let TestDb { db, .. } = logged_in_db().await;
    db.connect_registry().await.unwrap();

    let room = db
        .create_and_connect_room(NewRoomDescriptor::new(CollectionKey::Notes, "Untitled"))
        .await
        .unwrap();

    assert!(!room.alias_seed.is_empty());
    hearth_types::validate_seed(&room.alias_seed).unwrap();
}

#[tokio::test(start_paused = true)]
async fn creating_the_same_room_twice_converges() {
    let TestDb { db, mocks } = logged_in_db().await;
    db.connect_registry().await.unwrap();

    let desc = NewRoomDescriptor::new(CollectionKey::Notes, "Dup").with_seed("dup");
    let first = db.create_and_connect_room(desc.clone()).await.unwrap();
    let second = db.create_and_connect_room(desc).await.unwrap();

    assert_eq!(first.id, second.id);
    assert!(Arc::ptr_eq(&first, &second));
    // registry + one room
    assert_eq!(mocks.federation.room_count(), 2);
}

// ── connect_room from the registry ───────────────────────────────

#[tokio::test(start_paused = true)]
async fn connect_room_resolves_identity_via_the_registry() {
    let TestDb { db, .. } = logged_in_db().await;
    db.connect_registry().await.unwrap();
    let created = db
        .create_and_connect_room(
            NewRoomDescriptor::new(CollectionKey::Notes, "Travel").with_seed("travel"),
        )
        .await
        .unwrap();

    // forget the in-memory room, keeping the registry entry
    db.disconnect_room(CollectionKey::Notes, "travel").await.unwrap();
    assert!(db.get_room(CollectionKey::Notes, "travel").await.is_none());

    let reconnected = db.connect_room(CollectionKey::Notes, "travel").await.unwrap();
    wait_until(|| reconnected.status() == ConnectStatus::Connected).await;
    assert_eq!(reconnected.id, created.id);
    // the display name comes back from the federation's room metadata
    assert_eq!(reconnected.name(), "Travel");
}

// ── rename_room ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn rename_room_updates_local_and_federation_metadata() {
    let TestDb { db, mocks } = logged_in_db().await;
    let room = db
        .load_room(&record_without_token(CollectionKey::Notes, "draft"))
        .await
        .unwrap();
    // make the room known to the federation so metadata can be posted
    let alias = room.alias.clone();
    mocks.federation.create_room(&alias, "draft").await.unwrap();
    let fed_id = mocks.federation.resolve_alias(&alias).await.unwrap().unwrap();
    assert_ne!(room.id, fed_id); // the record carried its own id

    db.disconnect_room(CollectionKey::Notes, "draft").await.unwrap();
    let room = db.connect_room(CollectionKey::Notes, "draft").await.unwrap();
    assert_eq!(room.id, fed_id);

    db.rename_room(CollectionKey::Notes, "draft", "Final").await.unwrap();
    assert_eq!(room.name(), "Final");
    assert_eq!(
        mocks.federation.room_name(&room.id).await.unwrap().as_deref(),
        Some("Final")
    );
}

#[tokio::test(start_paused = true)]
async fn rename_room_fails_for_unknown_room() {
    let TestDb { db, .. } = logged_in_db().await;
    assert!(matches!(
        db.rename_room(CollectionKey::Notes, "missing", "X").await.unwrap_err(),
        DbError::RoomNotFound(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn connect_room_fails_for_unknown_alias() {
    let TestDb { db, .. } = logged_in_db().await;
    db.connect_registry().await.unwrap();

    let err = db
        .connect_room(CollectionKey::Notes, "never-created")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::RoomNotFound(_)));
}

// ── shutdown ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn shutdown_disconnects_and_clears_everything() {
    let TestDb { db, .. } = logged_in_db().await;
    let room_a = db
        .load_room(&record_with_token(CollectionKey::Notes, "a"))
        .await
        .unwrap();
    let room_b = db
        .load_room(&record_with_token(CollectionKey::Flashcards, "b"))
        .await
        .unwrap();
    {
        let (a, b) = (room_a.clone(), room_b.clone());
        wait_until(move || {
            a.status() == ConnectStatus::Connected && b.status() == ConnectStatus::Connected
        })
        .await;
    }

    db.shutdown().await;

    assert_eq!(room_a.status(), ConnectStatus::Disconnected);
    assert_eq!(room_b.status(), ConnectStatus::Disconnected);
    for key in CollectionKey::ALL {
        assert!(db.rooms(key).await.is_empty());
    }
}
