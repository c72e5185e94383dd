//! Relay credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credential triple for the remote relay transport.
///
/// Issued by the credential server per room; the relay rejects stale
/// tokens, so callers check [`RelayToken::is_expired`] before reuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayToken {
    /// Bearer token for the relay connection.
    pub token: String,
    /// Relay endpoint URL the token is valid for.
    pub url: String,
    /// Expiry time; `None` means the token never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl RelayToken {
    /// Creates a token with an expiry.
    #[must_use]
    pub fn new(
        token: impl Into<String>,
        url: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            token: token.into(),
            url: url.into(),
            expires_at,
        }
    }

    /// Whether the token's expiry has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| t <= Utc::now())
    }
}
