//! Collection keys — the namespace tags that partition rooms.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Partitions rooms into namespaces by document type.
///
/// `Registry` is reserved for the single well-known directory room; the
/// other keys tag ordinary user collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKey {
    Notes,
    Flashcards,
    Profiles,
    Registry,
}

impl CollectionKey {
    /// All collection keys, registry included.
    pub const ALL: [CollectionKey; 4] = [
        CollectionKey::Notes,
        CollectionKey::Flashcards,
        CollectionKey::Profiles,
        CollectionKey::Registry,
    ];

    /// The user-facing collections (everything except the registry).
    pub const USER_COLLECTIONS: [CollectionKey; 3] = [
        CollectionKey::Notes,
        CollectionKey::Flashcards,
        CollectionKey::Profiles,
    ];

    /// The lowercase wire form of the key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CollectionKey::Notes => "notes",
            CollectionKey::Flashcards => "flashcards",
            CollectionKey::Profiles => "profiles",
            CollectionKey::Registry => "registry",
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notes" => Ok(CollectionKey::Notes),
            "flashcards" => Ok(CollectionKey::Flashcards),
            "profiles" => Ok(CollectionKey::Profiles),
            "registry" => Ok(CollectionKey::Registry),
            other => Err(Error::UnknownCollection(other.to_string())),
        }
    }
}
