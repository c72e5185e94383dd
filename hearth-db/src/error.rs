//! Error types for the replication core.

use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in the replication core.
#[derive(Debug, Error)]
pub enum DbError {
    /// Room descriptor is missing its id or collection key.
    #[error("invalid room descriptor: {0}")]
    InvalidRoomDescriptor(String),

    /// Alias or user id failed structural validation.
    #[error(transparent)]
    Types(#[from] hearth_types::Error),

    /// The registry never reached the populated predicate within budget.
    #[error("timed out waiting for registry to populate")]
    RegistryPopulationTimeout,

    /// Remote relay connection failure (transient, retried internally).
    #[error("relay connection error: {0}")]
    RelayConnection(String),

    /// Local durable storage failed to attach. Never retried.
    #[error("local storage error: {0}")]
    LocalStorage(String),

    /// The requested identity is already registered.
    #[error("user already exists: {0}")]
    UserAlreadyExists(String),

    /// Login or registration was rejected.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Username failed lexical validation before signup.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// No user is logged in for an operation that needs one.
    #[error("not logged in")]
    NotLoggedIn,

    /// Operation targeted a room that does not exist.
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// Document payload does not belong to the room's collection.
    #[error("document belongs to {found}, not {expected}")]
    CollectionMismatch {
        expected: hearth_types::CollectionKey,
        found: hearth_types::CollectionKey,
    },

    /// Federated room transport failure.
    #[error("federation error: {0}")]
    Federation(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
