//! Login and signup.

use crate::db::Database;
use crate::error::{DbError, DbResult};
use crate::events::{DbEvent, EventLevel};
use hearth_types::UserId;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

/// Process-wide authentication state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginStatus {
    #[default]
    Initial,
    Loading,
    Ok,
    Failed,
}

/// Credentials for `login` / `signup`. The homeserver comes from the
/// database config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginData {
    pub username: String,
    pub password: String,
}

/// Validates a username's lexical form before remote registration:
/// 1–64 characters of `[a-z0-9._=-]`.
pub fn validate_username(username: &str) -> DbResult<()> {
    if username.is_empty() || username.len() > 64 {
        return Err(DbError::InvalidUsername(
            "username must be 1-64 characters".into(),
        ));
    }
    if let Some(bad) = username
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || "._=-".contains(*c)))
    {
        return Err(DbError::InvalidUsername(format!(
            "username contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

impl Database {
    fn set_login_status(&self, status: LoginStatus) {
        self.store_login_status(status);
        self.emit(&DbEvent::new("loginStatus").with_data(json!({ "loginStatus": status })));
    }

    /// Authenticates against the federation and records the session
    /// identity. Sets `login_status` and emits `loginStatus` events as
    /// it progresses.
    pub async fn login(&self, data: &LoginData) -> DbResult<UserId> {
        self.set_login_status(LoginStatus::Loading);

        let user = match UserId::new(&data.username, &self.config.homeserver) {
            Ok(user) => user,
            Err(err) => {
                self.emit_diag("login", EventLevel::Error, err.to_string());
                self.set_login_status(LoginStatus::Failed);
                return Err(err.into());
            }
        };
        debug!(%user, "logging in");

        match self.providers.federation.login(&user, &data.password).await {
            Ok(_access_token) => {
                self.set_user_id(Some(user.clone()));
                self.set_login_status(LoginStatus::Ok);
                info!(%user, "logged in");
                self.emit(
                    &DbEvent::new("login")
                        .with_message("login successful")
                        .with_data(json!({ "userId": user })),
                );
                Ok(user)
            }
            Err(err) => {
                warn!(%user, %err, "login failed");
                self.emit_diag("login", EventLevel::Error, err.to_string());
                self.set_login_status(LoginStatus::Failed);
                Err(err)
            }
        }
    }

    /// Registers a new account, then logs in. Validates the username's
    /// lexical form first and surfaces a remote "already registered"
    /// error as [`DbError::UserAlreadyExists`].
    pub async fn signup(&self, data: &LoginData) -> DbResult<UserId> {
        self.set_login_status(LoginStatus::Loading);
        self.emit(&DbEvent::new("signup").with_message("starting signup"));

        if let Err(err) = validate_username(&data.username) {
            self.emit_diag("signup", EventLevel::Error, err.to_string());
            self.set_login_status(LoginStatus::Failed);
            return Err(err);
        }

        match self
            .providers
            .federation
            .register(&data.username, &data.password)
            .await
        {
            Ok(()) => {
                debug!(username = %data.username, "registered");
            }
            Err(DbError::UserAlreadyExists(username)) => {
                self.emit(
                    &DbEvent::new("signup")
                        .with_message("user already exists")
                        .with_level(EventLevel::Error),
                );
                self.set_login_status(LoginStatus::Failed);
                return Err(DbError::UserAlreadyExists(username));
            }
            Err(err) => {
                self.emit_diag("signup", EventLevel::Error, err.to_string());
                self.set_login_status(LoginStatus::Failed);
                return Err(err);
            }
        }

        let user = self.login(data).await?;
        self.emit(&DbEvent::new("signup").with_message("finished signup"));
        Ok(user)
    }
}
