//! Relational room store for Hearth.
//!
//! Server-side persistence of room rows and the user → room-id-list
//! association, backed by SQLite. Read-modify-write of a user's room
//! list always runs inside an exclusive transaction so concurrent
//! inserts and deletes serialize without lost updates; read-only
//! listings take no lock.
//!
//! Also home of the access-grant resolver: the pure function mapping an
//! [`hearth_types::AccessGrant`] to the concrete set of rooms it
//! authorizes.

mod error;
mod grants;
mod rooms;

pub use error::{StoreError, StoreResult};
pub use grants::{grant_matches, resolve_grant, resolve_grant_rooms};
pub use rooms::{RoomStore, RoomUpdate};
