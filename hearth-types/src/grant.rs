//! Access grants — authorization records resolved into concrete room sets.

use crate::{CollectionKey, Error, RoomId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One collection clause of a grant: a concrete key, or the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum GrantCollection {
    /// Wildcard: every room the owner can write to.
    All,
    Key(CollectionKey),
}

impl fmt::Display for GrantCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantCollection::All => f.write_str("all"),
            GrantCollection::Key(key) => f.write_str(key.as_str()),
        }
    }
}

impl From<GrantCollection> for String {
    fn from(c: GrantCollection) -> Self {
        c.to_string()
    }
}

impl TryFrom<String> for GrantCollection {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "all" {
            Ok(GrantCollection::All)
        } else {
            Ok(GrantCollection::Key(s.parse()?))
        }
    }
}

/// Authorization record mapping an owner plus collection/room clauses to
/// the set of rooms a request may touch.
///
/// Immutable once issued; resolution (in `hearth-store`) is pure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub owner_id: UserId,
    /// Collection clauses; may include the wildcard.
    pub collections: Vec<GrantCollection>,
    /// Explicit room allow-list. An empty list matches nothing — it never
    /// means "all rooms".
    pub room_ids: Vec<RoomId>,
}

impl AccessGrant {
    #[must_use]
    pub fn new(owner_id: UserId) -> Self {
        Self {
            owner_id,
            collections: Vec::new(),
            room_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_collections(mut self, collections: Vec<GrantCollection>) -> Self {
        self.collections = collections;
        self
    }

    #[must_use]
    pub fn with_room_ids(mut self, room_ids: Vec<RoomId>) -> Self {
        self.room_ids = room_ids;
        self
    }

    /// Whether the wildcard clause is present.
    #[must_use]
    pub fn is_all_access(&self) -> bool {
        self.collections.contains(&GrantCollection::All)
    }

    /// The concrete collection keys, wildcard excluded.
    #[must_use]
    pub fn collection_keys(&self) -> Vec<CollectionKey> {
        self.collections
            .iter()
            .filter_map(|c| match c {
                GrantCollection::Key(key) => Some(*key),
                GrantCollection::All => None,
            })
            .collect()
    }
}
