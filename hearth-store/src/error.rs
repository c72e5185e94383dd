//! Error types for the relational store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Update or delete targeted a nonexistent room.
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// A stored row failed to decode.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
