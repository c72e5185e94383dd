//! Typed document payloads.
//!
//! Each user collection stores one document shape; the tagged union
//! makes a payload's collection explicit instead of carrying an
//! untyped property bag. Arbitrary extra values can still live beside
//! typed documents in the room's mapped container.

use crate::CollectionKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The per-collection document shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DocumentBody {
    Note {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Flashcard {
        front_text: String,
        back_text: String,
    },
    #[serde(rename_all = "camelCase")]
    Profile {
        first_name: String,
        last_name: String,
    },
}

impl DocumentBody {
    /// The collection a payload of this shape belongs to.
    #[must_use]
    pub const fn collection_key(&self) -> CollectionKey {
        match self {
            DocumentBody::Note { .. } => CollectionKey::Notes,
            DocumentBody::Flashcard { .. } => CollectionKey::Flashcards,
            DocumentBody::Profile { .. } => CollectionKey::Profiles,
        }
    }
}

/// One document inside a room, keyed by `id` in the room's mapped
/// container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub body: DocumentBody,
}

impl Document {
    /// Creates a fresh document with both timestamps set to now.
    #[must_use]
    pub fn new(id: impl Into<String>, body: DocumentBody) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            deleted: false,
            created_at: now,
            updated_at: now,
            body,
        }
    }

    /// The collection this document belongs to, per its body shape.
    #[must_use]
    pub const fn collection_key(&self) -> CollectionKey {
        self.body.collection_key()
    }

    /// Marks the document updated now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
