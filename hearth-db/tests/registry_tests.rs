mod common;

use common::*;
use hearth_db::{ConnectStatus, DbError, DocMap, EventLevel, REGISTRY_ALIAS_SEED};
use hearth_types::CollectionKey;
use std::time::Duration;

// ── get_or_create_registry ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn get_or_create_registry_is_idempotent() {
    let TestDb { db, mocks } = logged_in_db().await;

    let (alias, id) = db.get_or_create_registry().await.unwrap();
    let (alias2, id2) = db.get_or_create_registry().await.unwrap();

    assert_eq!(alias, alias2);
    assert_eq!(id, id2);
    assert_eq!(mocks.federation.room_count(), 1);
    assert_eq!(alias.seed(), REGISTRY_ALIAS_SEED);
    assert_eq!(alias.collection(), CollectionKey::Registry);
}

#[tokio::test(start_paused = true)]
async fn racing_creators_converge_on_one_registry() {
    let TestDb { db, mocks } = logged_in_db().await;

    let (a, b) = tokio::join!(db.get_or_create_registry(), db.get_or_create_registry());
    assert_eq!(a.unwrap().1, b.unwrap().1);
    assert_eq!(mocks.federation.room_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn get_or_create_requires_login() {
    let TestDb { db, .. } = test_db();
    assert!(matches!(
        db.get_or_create_registry().await.unwrap_err(),
        DbError::NotLoggedIn
    ));
}

// ── connect_registry ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn connect_registry_loads_and_connects_the_room() {
    let TestDb { db, .. } = logged_in_db().await;

    let registry = db.connect_registry().await.unwrap();
    wait_until(|| registry.status() == ConnectStatus::Connected).await;

    assert_eq!(registry.collection_key, CollectionKey::Registry);
    assert!(registry.is_local_loaded());
    assert!(db.registry_room().await.is_some());
}

// ── populated predicate ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn fresh_registry_is_not_populated() {
    let TestDb { db, .. } = logged_in_db().await;
    db.connect_registry().await.unwrap();
    assert!(!db.check_registry_populated().await);
}

#[tokio::test(start_paused = true)]
async fn populate_registry_emits_three_events_in_order() {
    let TestDb { db, .. } = logged_in_db().await;
    db.connect_registry().await.unwrap();

    let events = collect_events(&db);
    db.populate_registry("alice-profile").await.unwrap();

    let messages: Vec<String> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.event == "populateRegistry")
        .map(|e| e.message.clone().unwrap())
        .collect();
    assert_eq!(
        messages,
        vec![
            "starting populateRegistry",
            "created profile room",
            "populated registry",
        ]
    );
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.event == "populateRegistry")
        .all(|e| e.level == EventLevel::Info));

    assert!(db.check_registry_populated().await);
}

#[tokio::test(start_paused = true)]
async fn populate_registry_records_the_profile_room() {
    let TestDb { db, mocks } = logged_in_db().await;
    db.connect_registry().await.unwrap();

    db.populate_registry("alice-profile").await.unwrap();

    let directory = db.registry_directory().await.unwrap();
    let entry = directory.profiles.get("public").unwrap();
    assert!(entry.room_alias.contains("~profiles~"));
    assert!(entry.room_id.is_some());
    // registry + profile room exist on the federation
    assert_eq!(mocks.federation.room_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn populate_registry_is_idempotent_on_the_profile_room() {
    let TestDb { db, mocks } = logged_in_db().await;
    db.connect_registry().await.unwrap();

    db.populate_registry("alice-profile").await.unwrap();
    let first = db.registry_directory().await.unwrap();
    db.populate_registry("alice-profile").await.unwrap();
    let second = db.registry_directory().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(mocks.federation.room_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn wiping_the_registry_document_unpopulates_it() {
    let TestDb { db, .. } = logged_in_db().await;
    db.connect_registry().await.unwrap();
    db.populate_registry("alice-profile").await.unwrap();
    assert!(db.check_registry_populated().await);

    let registry = db.registry_room().await.unwrap();
    registry.doc().unwrap().map("documents").clear();
    assert!(!db.check_registry_populated().await);
}

#[tokio::test(start_paused = true)]
async fn populate_registry_requires_a_loaded_registry() {
    let TestDb { db, .. } = logged_in_db().await;
    let err = db.populate_registry("alice-profile").await.unwrap_err();
    assert!(matches!(err, DbError::RoomNotFound(_)));
}

// ── wait_for_registry_populated ──────────────────────────────────

#[tokio::test(start_paused = true)]
async fn wait_for_populated_times_out_on_schedule() {
    let TestDb { db, .. } = logged_in_db().await;
    db.connect_registry().await.unwrap();

    let started = tokio::time::Instant::now();
    let err = db
        .wait_for_registry_populated(Duration::from_millis(50), Duration::from_millis(200))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, DbError::RegistryPopulationTimeout));
    assert!(elapsed >= Duration::from_millis(200), "failed early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "failed late: {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn wait_for_populated_resolves_once_populated() {
    let TestDb { db, .. } = logged_in_db().await;
    db.connect_registry().await.unwrap();

    let populater = db.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        populater.populate_registry("late-profile").await.unwrap();
    });

    db.wait_for_registry_populated(Duration::from_millis(50), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(db.check_registry_populated().await);
}
