//! Access grant resolution.
//!
//! Pure functions mapping an access grant to the concrete, non-deleted
//! rooms it authorizes. With the wildcard clause the grant covers every
//! room the owner can write to; otherwise a room matches when it is
//! named explicitly or tagged with a granted collection. An empty
//! explicit-id list contributes zero matches — it never means "all".

use hearth_types::{AccessGrant, RoomId, RoomRecord};
use std::collections::HashSet;

/// Whether a single non-deleted room falls under the grant.
#[must_use]
pub fn grant_matches(grant: &AccessGrant, room: &RoomRecord) -> bool {
    if room.deleted {
        return false;
    }
    if grant.is_all_access() {
        return room.write_access.contains(&grant.owner_id);
    }
    grant.room_ids.contains(&room.id)
        || grant.collection_keys().contains(&room.collection_key)
}

/// Resolves a grant against a set of rooms, returning matching rows.
/// Results are unique by room id.
pub fn resolve_grant_rooms<'a>(
    grant: &AccessGrant,
    rooms: impl IntoIterator<Item = &'a RoomRecord>,
) -> Vec<&'a RoomRecord> {
    let mut seen = HashSet::new();
    rooms
        .into_iter()
        .filter(|room| grant_matches(grant, room))
        .filter(|room| seen.insert(room.id))
        .collect()
}

/// Resolves a grant to the matching room ids.
pub fn resolve_grant<'a>(
    grant: &AccessGrant,
    rooms: impl IntoIterator<Item = &'a RoomRecord>,
) -> Vec<RoomId> {
    resolve_grant_rooms(grant, rooms)
        .into_iter()
        .map(|room| room.id)
        .collect()
}
