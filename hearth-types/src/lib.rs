//! Core type definitions for Hearth.
//!
//! This crate defines the fundamental, transport-agnostic types used
//! throughout the replication layer:
//! - Room and user identifiers
//! - Collection keys (the namespace tags that partition rooms)
//! - The room alias model (deterministic, parseable room addressing)
//! - Relay tokens and their expiry rules
//! - Server-side room records and access grants
//!
//! Everything that talks to a concrete transport or store lives in
//! `hearth-db` and `hearth-store`, not here.

mod alias;
mod collection;
mod document;
mod grant;
mod ids;
mod record;
mod token;

pub use alias::{random_seed, validate_seed, RoomAlias, MAX_SEED_LEN};
pub use collection::CollectionKey;
pub use document::{Document, DocumentBody};
pub use grant::{AccessGrant, GrantCollection};
pub use ids::{RoomId, UserId};
pub use record::{NewRoomDescriptor, RoomRecord};
pub use token::RelayToken;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed alias: {0}")]
    MalformedAlias(String),

    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("invalid alias seed: {0}")]
    InvalidSeed(String),

    #[error("unknown collection key: {0}")]
    UnknownCollection(String),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
