#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use hearth_db::providers::mock::MockProviders;
use hearth_db::{Database, DatabaseConfig, DbEvent, LoginData};
use hearth_types::{CollectionKey, RelayToken, RoomRecord, UserId};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret";

pub struct TestDb {
    pub db: Database,
    pub mocks: MockProviders,
}

/// Installs a test subscriber honoring `RUST_LOG`. Safe to call from
/// every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A database over fresh mocks with a seeded account, not logged in.
pub fn test_db() -> TestDb {
    init_tracing();
    let mocks = MockProviders::new();
    mocks.federation.seed_account(USERNAME, PASSWORD);
    let config = DatabaseConfig {
        retry_backoff: Duration::from_millis(50),
        ..Default::default()
    };
    let db = Database::new(config, mocks.provider_set());
    TestDb { db, mocks }
}

/// A database with the test account already logged in.
pub async fn logged_in_db() -> TestDb {
    let fixture = test_db();
    fixture
        .db
        .login(&LoginData {
            username: USERNAME.into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap();
    fixture
}

pub fn test_user() -> UserId {
    UserId::new(USERNAME, "localhost:8008").unwrap()
}

/// A record with a live relay token.
pub fn record_with_token(collection_key: CollectionKey, seed: &str) -> RoomRecord {
    let mut record = RoomRecord::new(collection_key, seed, seed, test_user());
    record.set_token(&RelayToken::new(
        format!("token-{seed}"),
        format!("wss://relay.test/{seed}"),
        Some(Utc::now() + ChronoDuration::hours(1)),
    ));
    record
}

/// A record with no relay credentials (local-only).
pub fn record_without_token(collection_key: CollectionKey, seed: &str) -> RoomRecord {
    RoomRecord::new(collection_key, seed, seed, test_user())
}

/// Polls `cond` until it holds, panicking after ~5 virtual seconds.
/// Run tests with `start_paused = true` so the sleeps auto-advance.
pub async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

/// Collects every event emitted on the database bus.
pub fn collect_events(db: &Database) -> Arc<Mutex<Vec<DbEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    db.on_event(move |event| sink.lock().unwrap().push(event.clone()));
    events
}
