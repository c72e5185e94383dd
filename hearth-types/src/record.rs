//! Server-side room records.

use crate::{CollectionKey, RelayToken, RoomAlias, RoomId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One room row as the relational store and the facade exchange it.
///
/// Rows are soft-deleted (`deleted = true`) before being garbage
/// collected; resolvers and listings must skip soft-deleted rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub id: RoomId,
    pub collection_key: CollectionKey,
    pub name: String,
    pub alias_seed: String,
    pub owner_id: UserId,
    /// Users allowed to write to the room.
    pub write_access: Vec<UserId>,
    /// Relay endpoint for this room, if remote sync is provisioned.
    pub relay_url: Option<String>,
    /// Relay bearer token, if provisioned.
    pub relay_token: Option<String>,
    /// Expiry of `relay_token`.
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Soft-delete marker.
    pub deleted: bool,
    /// Optional hard-delete deadline for temporary rooms.
    pub ttl: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoomRecord {
    /// Creates a fresh record owned (and writable) by `owner`.
    #[must_use]
    pub fn new(
        collection_key: CollectionKey,
        name: impl Into<String>,
        alias_seed: impl Into<String>,
        owner_id: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RoomId::new(),
            collection_key,
            name: name.into(),
            alias_seed: alias_seed.into(),
            write_access: vec![owner_id.clone()],
            owner_id,
            relay_url: None,
            relay_token: None,
            token_expires_at: None,
            deleted: false,
            ttl: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The record's alias, derived from seed, collection, and owner.
    pub fn alias(&self) -> crate::Result<RoomAlias> {
        RoomAlias::build(&self.alias_seed, self.collection_key, &self.owner_id)
    }

    /// Assembles the relay credential triple, if both parts are present.
    #[must_use]
    pub fn token(&self) -> Option<RelayToken> {
        match (&self.relay_token, &self.relay_url) {
            (Some(token), Some(url)) => {
                Some(RelayToken::new(token.clone(), url.clone(), self.token_expires_at))
            }
            _ => None,
        }
    }

    /// Sets the relay credential fields from a token triple.
    pub fn set_token(&mut self, token: &RelayToken) {
        self.relay_token = Some(token.token.clone());
        self.relay_url = Some(token.url.clone());
        self.token_expires_at = token.expires_at;
    }
}

/// Caller-supplied description of a room to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRoomDescriptor {
    pub collection_key: CollectionKey,
    pub name: String,
    /// Alias seed; a random seed is minted when absent.
    #[serde(default)]
    pub alias_seed: Option<String>,
    /// Optional hard-delete deadline for temporary rooms.
    #[serde(default)]
    pub ttl: Option<DateTime<Utc>>,
}

impl NewRoomDescriptor {
    #[must_use]
    pub fn new(collection_key: CollectionKey, name: impl Into<String>) -> Self {
        Self {
            collection_key,
            name: name.into(),
            alias_seed: None,
            ttl: None,
        }
    }

    /// Pins the alias seed instead of minting a random one.
    #[must_use]
    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.alias_seed = Some(seed.into());
        self
    }
}
