mod common;

use common::*;
use hearth_db::{validate_username, DbError, EventLevel, LoginData, LoginStatus};

fn creds(username: &str, password: &str) -> LoginData {
    LoginData {
        username: username.into(),
        password: password.into(),
    }
}

// ── validate_username ────────────────────────────────────────────

#[test]
fn usernames_accept_lowercase_alphanumerics_and_punctuation() {
    validate_username("alice").unwrap();
    validate_username("a.b_c-d=e").unwrap();
    validate_username("user123").unwrap();
}

#[test]
fn usernames_reject_bad_lexical_forms() {
    assert!(validate_username("").is_err());
    assert!(validate_username("Alice").is_err());
    assert!(validate_username("al ice").is_err());
    assert!(validate_username("al@ce").is_err());
    assert!(validate_username(&"a".repeat(65)).is_err());
}

// ── login ────────────────────────────────────────────────────────

#[tokio::test]
async fn login_sets_status_and_identity() {
    let TestDb { db, .. } = test_db();
    assert_eq!(db.login_status(), LoginStatus::Initial);
    let events = collect_events(&db);

    let user = db.login(&creds(USERNAME, PASSWORD)).await.unwrap();

    assert_eq!(user, test_user());
    assert_eq!(db.user_id(), Some(user));
    assert_eq!(db.login_status(), LoginStatus::Ok);

    let statuses: Vec<String> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.event == "loginStatus")
        .map(|e| e.data.as_ref().unwrap()["loginStatus"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(statuses, vec!["loading", "ok"]);
}

#[tokio::test]
async fn login_with_bad_credentials_fails() {
    let TestDb { db, .. } = test_db();
    let events = collect_events(&db);

    let err = db.login(&creds(USERNAME, "wrong")).await.unwrap_err();

    assert!(matches!(err, DbError::AuthenticationFailed(_)));
    assert_eq!(db.login_status(), LoginStatus::Failed);
    assert!(db.user_id().is_none());
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| e.event == "login" && e.level == EventLevel::Error));
}

// ── signup ───────────────────────────────────────────────────────

#[tokio::test]
async fn signup_registers_then_logs_in() {
    let TestDb { db, .. } = test_db();

    let user = db.signup(&creds("bob", "hunter2")).await.unwrap();

    assert_eq!(user.local_part(), "bob");
    assert_eq!(db.login_status(), LoginStatus::Ok);
    assert_eq!(db.user_id(), Some(user));
}

#[tokio::test]
async fn signup_surfaces_user_already_exists() {
    let TestDb { db, .. } = test_db();
    let events = collect_events(&db);

    // USERNAME is pre-registered by the fixture
    let err = db.signup(&creds(USERNAME, "whatever")).await.unwrap_err();

    assert!(matches!(err, DbError::UserAlreadyExists(_)));
    assert_eq!(db.login_status(), LoginStatus::Failed);
    assert!(events.lock().unwrap().iter().any(|e| {
        e.event == "signup"
            && e.level == EventLevel::Error
            && e.message.as_deref() == Some("user already exists")
    }));
}

#[tokio::test]
async fn signup_validates_username_before_registration() {
    let TestDb { db, .. } = test_db();

    let err = db.signup(&creds("Not Valid", "pw")).await.unwrap_err();

    assert!(matches!(err, DbError::InvalidUsername(_)));
    assert_eq!(db.login_status(), LoginStatus::Failed);
    // the invalid name never reached the federation
    assert!(db.login(&creds("Not Valid", "pw")).await.is_err());
}

#[tokio::test]
async fn signup_emits_progress_events() {
    let TestDb { db, .. } = test_db();
    let events = collect_events(&db);

    db.signup(&creds("carol", "pw")).await.unwrap();

    let messages: Vec<String> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.event == "signup")
        .map(|e| e.message.clone().unwrap())
        .collect();
    assert_eq!(messages, vec!["starting signup", "finished signup"]);
}
