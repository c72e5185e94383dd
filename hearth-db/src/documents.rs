//! Typed access to a room's documents.
//!
//! Rooms store their documents in the shared doc's `documents` map,
//! keyed by document id. The typed accessors check that a payload's
//! shape matches the room's collection; untyped values can still be
//! written through the map directly.

use crate::db::Database;
use crate::error::{DbError, DbResult};
use crate::providers::DocMap;
use crate::room::Room;
use hearth_types::Document;
use std::sync::Arc;

/// Name of the mapped container holding a room's documents.
pub const ROOM_DOCUMENTS_MAP: &str = "documents";

impl Database {
    /// The mapped container holding the room's documents.
    pub fn room_documents(&self, room: &Arc<Room>) -> DbResult<Arc<dyn DocMap>> {
        room.doc()
            .map(|doc| doc.map(ROOM_DOCUMENTS_MAP))
            .ok_or_else(|| DbError::RoomNotFound(format!("{} is not loaded", room.alias)))
    }

    /// Writes a document into the room, enforcing that its shape
    /// matches the room's collection.
    pub fn put_document(&self, room: &Arc<Room>, document: &Document) -> DbResult<()> {
        if document.collection_key() != room.collection_key {
            return Err(DbError::CollectionMismatch {
                expected: room.collection_key,
                found: document.collection_key(),
            });
        }
        self.room_documents(room)?
            .set(&document.id, serde_json::to_value(document)?);
        Ok(())
    }

    /// Reads a document by id. `None` when absent; an error when the
    /// stored value does not decode as a document.
    pub fn get_document(&self, room: &Arc<Room>, id: &str) -> DbResult<Option<Document>> {
        match self.room_documents(room)?.get(id) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Ids of every document in the room.
    pub fn document_ids(&self, room: &Arc<Room>) -> DbResult<Vec<String>> {
        Ok(self.room_documents(room)?.keys())
    }

    /// Soft-deletes a document in place.
    pub fn delete_document(&self, room: &Arc<Room>, id: &str) -> DbResult<bool> {
        let Some(mut document) = self.get_document(room, id)? else {
            return Ok(false);
        };
        document.deleted = true;
        document.touch();
        self.room_documents(room)?
            .set(id, serde_json::to_value(&document)?);
        Ok(true)
    }
}
