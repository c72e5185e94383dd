//! Identifier types used throughout the Hearth core.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a room (one replicated document channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(Uuid);

impl RoomId {
    /// Creates a new random room ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a room ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Whether this is the all-zero placeholder ID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Parses a room ID from a string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A fully-qualified user identifier of the form `@local:server`.
///
/// The local part carries the username; the server part names the home
/// federation server the account lives on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Builds a user ID from a username and a homeserver.
    ///
    /// A scheme prefix (`http://` / `https://`) on the homeserver is
    /// stripped, so `UserId::new("alice", "https://example.org")` and
    /// `UserId::new("alice", "example.org")` are the same identity.
    pub fn new(username: &str, homeserver: &str) -> crate::Result<Self> {
        if username.is_empty() {
            return Err(Error::InvalidUserId("username is empty".into()));
        }
        if homeserver.is_empty() {
            return Err(Error::InvalidUserId("homeserver is empty".into()));
        }
        if username.contains('@') || username.contains(':') {
            return Err(Error::InvalidUserId(format!(
                "username must not contain '@' or ':': {username}"
            )));
        }
        let host = homeserver
            .split_once("://")
            .map_or(homeserver, |(_, rest)| rest);
        if host.is_empty() {
            return Err(Error::InvalidUserId(format!(
                "homeserver has no host part: {homeserver}"
            )));
        }
        Ok(Self(format!("@{username}:{host}")))
    }

    /// Parses a `@local:server` string, validating its shape.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let rest = s
            .strip_prefix('@')
            .ok_or_else(|| Error::InvalidUserId(format!("missing '@' prefix: {s}")))?;
        let (local, server) = rest
            .split_once(':')
            .ok_or_else(|| Error::InvalidUserId(format!("missing ':' separator: {s}")))?;
        if local.is_empty() || server.is_empty() {
            return Err(Error::InvalidUserId(format!(
                "empty local or server part: {s}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Returns the local part of the ID.
    ///
    /// `@alice:example.org` → `alice`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        // shape validated at construction
        self.0[1..].split(':').next().unwrap_or_default()
    }

    /// Returns the server part of the ID.
    #[must_use]
    pub fn server(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, s)| s)
    }

    /// Returns the full `@local:server` form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
