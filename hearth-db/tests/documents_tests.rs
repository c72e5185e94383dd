mod common;

use common::*;
use hearth_db::DbError;
use hearth_types::{CollectionKey, Document, DocumentBody};

fn note(id: &str, text: &str) -> Document {
    Document::new(id, DocumentBody::Note { text: text.into() })
}

#[tokio::test(start_paused = true)]
async fn put_and_get_round_trip() {
    let TestDb { db, .. } = logged_in_db().await;
    let room = db
        .load_room(&record_without_token(CollectionKey::Notes, "notes"))
        .await
        .unwrap();

    let doc = note("n-1", "buy milk");
    db.put_document(&room, &doc).unwrap();

    let fetched = db.get_document(&room, "n-1").unwrap().unwrap();
    assert_eq!(fetched, doc);
    assert_eq!(db.document_ids(&room).unwrap(), vec!["n-1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn get_missing_document_is_none() {
    let TestDb { db, .. } = logged_in_db().await;
    let room = db
        .load_room(&record_without_token(CollectionKey::Notes, "notes"))
        .await
        .unwrap();
    assert!(db.get_document(&room, "nope").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn put_rejects_wrong_collection() {
    let TestDb { db, .. } = logged_in_db().await;
    let room = db
        .load_room(&record_without_token(CollectionKey::Flashcards, "cards"))
        .await
        .unwrap();

    let err = db.put_document(&room, &note("n-1", "not a card")).unwrap_err();
    assert!(matches!(err, DbError::CollectionMismatch { .. }));
    assert!(db.get_document(&room, "n-1").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn documents_require_a_loaded_room() {
    let TestDb { db, .. } = logged_in_db().await;
    let room = db
        .get_or_set_room(CollectionKey::Notes, "unloaded")
        .await
        .unwrap();

    let err = db.put_document(&room, &note("n-1", "x")).unwrap_err();
    assert!(matches!(err, DbError::RoomNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn delete_document_soft_deletes_in_place() {
    let TestDb { db, .. } = logged_in_db().await;
    let room = db
        .load_room(&record_without_token(CollectionKey::Notes, "notes"))
        .await
        .unwrap();
    db.put_document(&room, &note("n-1", "old")).unwrap();

    assert!(db.delete_document(&room, "n-1").unwrap());
    let fetched = db.get_document(&room, "n-1").unwrap().unwrap();
    assert!(fetched.deleted);

    // deleting a missing document reports false
    assert!(!db.delete_document(&room, "ghost").unwrap());
}
