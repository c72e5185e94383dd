//! Room rows and the user → room-id-list association.
//!
//! Every read-modify-write of a user's room list (insert, delete, the
//! for-update listing) runs inside an exclusive transaction, which is
//! SQLite's equivalent of row-level `select for update` locking. Plain
//! reads go straight through.

use crate::error::{StoreError, StoreResult};
use crate::grants::resolve_grant_rooms;
use chrono::{DateTime, Utc};
use hearth_types::{AccessGrant, CollectionKey, RoomId, RoomRecord, UserId};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Partial update of a room row. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct RoomUpdate {
    pub id: RoomId,
    pub name: Option<String>,
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub deleted: Option<bool>,
    pub ttl: Option<DateTime<Utc>>,
}

impl RoomUpdate {
    #[must_use]
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Persistent store for room rows backed by SQLite.
#[derive(Clone)]
pub struct RoomStore {
    conn: Arc<Mutex<Connection>>,
}

impl RoomStore {
    /// Opens (or creates) a room store at the given path.
    pub fn new(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Storage(format!("failed to open room store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory room store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Storage(format!("failed to open in-memory store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                collection_key TEXT NOT NULL,
                name TEXT NOT NULL,
                alias_seed TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                write_access TEXT NOT NULL,
                relay_url TEXT,
                relay_token TEXT,
                token_expires_at TEXT,
                deleted INTEGER NOT NULL DEFAULT 0,
                ttl TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_rooms (
                user_id TEXT PRIMARY KEY,
                room_ids TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| StoreError::Storage(format!("failed to init room schema: {e}")))?;
        Ok(())
    }

    // ── Reads (no lock) ──────────────────────────────────────────

    /// Fetches one room by id.
    pub fn room_by_id(&self, id: &RoomId) -> StoreResult<Option<RoomRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM rooms WHERE id = ?1")
            .map_err(|e| StoreError::Storage(format!("failed to prepare room query: {e}")))?;
        let mut rows = stmt
            .query_map(params![id.to_string()], row_to_record)
            .map_err(|e| StoreError::Storage(format!("failed to query room: {e}")))?;
        match rows.next() {
            Some(row) => Ok(Some(
                row.map_err(|e| StoreError::Storage(format!("failed to read room row: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    /// Fetches rooms by id, skipping unknown ids.
    pub fn rooms_by_ids(&self, ids: &[RoomId]) -> StoreResult<Vec<RoomRecord>> {
        let mut rooms = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(room) = self.room_by_id(id)? {
                rooms.push(room);
            }
        }
        Ok(rooms)
    }

    /// All room rows, soft-deleted included.
    pub fn all_rooms(&self) -> StoreResult<Vec<RoomRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM rooms")
            .map_err(|e| StoreError::Storage(format!("failed to prepare rooms query: {e}")))?;
        let rows = stmt
            .query_map([], row_to_record)
            .map_err(|e| StoreError::Storage(format!("failed to query rooms: {e}")))?;
        let mut rooms = Vec::new();
        for row in rows {
            rooms.push(
                row.map_err(|e| StoreError::Storage(format!("failed to read room row: {e}")))?,
            );
        }
        Ok(rooms)
    }

    /// The user's room-id list. Read-only, so no lock is taken.
    pub fn user_room_ids(&self, user_id: &UserId) -> StoreResult<Vec<RoomId>> {
        let conn = self.conn.lock().unwrap();
        read_user_room_ids(&conn, user_id)
    }

    // ── Locked read-modify-write ─────────────────────────────────

    /// The user's profile rooms, read under an exclusive transaction so
    /// a concurrent insert/delete cannot interleave.
    pub fn profile_rooms_for_update(&self, user_id: &UserId) -> StoreResult<Vec<RoomRecord>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::Storage(format!("failed to begin transaction: {e}")))?;

        let ids = read_user_room_ids(&tx, user_id)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut rooms = Vec::new();
        let mut stmt = tx
            .prepare("SELECT * FROM rooms WHERE id = ?1 AND collection_key = 'profiles'")
            .map_err(|e| StoreError::Storage(format!("failed to prepare profile query: {e}")))?;
        for id in &ids {
            let mut found = stmt
                .query_map(params![id.to_string()], row_to_record)
                .map_err(|e| StoreError::Storage(format!("failed to query profile room: {e}")))?;
            if let Some(row) = found.next() {
                rooms.push(
                    row.map_err(|e| {
                        StoreError::Storage(format!("failed to read profile row: {e}"))
                    })?,
                );
            }
        }
        drop(stmt);

        tx.commit()
            .map_err(|e| StoreError::Storage(format!("failed to commit: {e}")))?;
        Ok(rooms)
    }

    /// Inserts rooms and appends them to the user's room list, inside
    /// one exclusive transaction. Rooms whose id already exists are
    /// left untouched. Returns the number of new rows.
    pub fn insert_rooms(&self, user_id: &UserId, inserts: &[RoomRecord]) -> StoreResult<usize> {
        if inserts.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::Storage(format!("failed to begin transaction: {e}")))?;

        let mut ids = read_user_room_ids(&tx, user_id)?;
        for record in inserts {
            if !ids.contains(&record.id) {
                ids.push(record.id);
            }
        }
        write_user_room_ids(&tx, user_id, &ids)?;

        let mut inserted = 0;
        for record in inserts {
            let exists: bool = tx
                .query_row(
                    "SELECT COUNT(*) FROM rooms WHERE id = ?1",
                    params![record.id.to_string()],
                    |row| row.get::<_, i64>(0),
                )
                .map_err(|e| StoreError::Storage(format!("failed to check room: {e}")))?
                > 0;
            if exists {
                continue;
            }
            tx.execute(
                "INSERT INTO rooms (id, collection_key, name, alias_seed, owner_id,
                                    write_access, relay_url, relay_token, token_expires_at,
                                    deleted, ttl, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    record.id.to_string(),
                    record.collection_key.as_str(),
                    record.name,
                    record.alias_seed,
                    record.owner_id.to_string(),
                    serde_json::to_string(&record.write_access)?,
                    record.relay_url,
                    record.relay_token,
                    record.token_expires_at.map(|t| t.to_rfc3339()),
                    record.deleted as i64,
                    record.ttl.map(|t| t.to_rfc3339()),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::Storage(format!("failed to insert room: {e}")))?;
            inserted += 1;
        }

        tx.commit()
            .map_err(|e| StoreError::Storage(format!("failed to commit: {e}")))?;
        debug!(user = %user_id, inserted, "inserted rooms");
        Ok(inserted)
    }

    /// Hard-deletes rooms and removes them from the user's room list,
    /// inside one exclusive transaction.
    pub fn delete_rooms(&self, user_id: &UserId, ids: &[RoomId]) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::Storage(format!("failed to begin transaction: {e}")))?;

        let current = read_user_room_ids(&tx, user_id)?;
        let remaining: Vec<RoomId> = current
            .into_iter()
            .filter(|id| !ids.contains(id))
            .collect();
        write_user_room_ids(&tx, user_id, &remaining)?;

        for id in ids {
            tx.execute(
                "DELETE FROM rooms WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(|e| StoreError::Storage(format!("failed to delete room: {e}")))?;
        }

        tx.commit()
            .map_err(|e| StoreError::Storage(format!("failed to commit: {e}")))?;
        debug!(user = %user_id, count = ids.len(), "deleted rooms");
        Ok(())
    }

    /// Applies a partial update, returning the updated row.
    /// Fails with [`StoreError::RoomNotFound`] for unknown ids.
    pub fn update_room(&self, update: &RoomUpdate) -> StoreResult<RoomRecord> {
        let mut room = self
            .room_by_id(&update.id)?
            .ok_or_else(|| StoreError::RoomNotFound(update.id.to_string()))?;

        if let Some(name) = &update.name {
            room.name = name.clone();
        }
        if let Some(url) = &update.relay_url {
            room.relay_url = Some(url.clone());
        }
        if let Some(token) = &update.relay_token {
            room.relay_token = Some(token.clone());
        }
        if let Some(expires) = update.token_expires_at {
            room.token_expires_at = Some(expires);
        }
        if let Some(deleted) = update.deleted {
            room.deleted = deleted;
        }
        if let Some(ttl) = update.ttl {
            room.ttl = Some(ttl);
        }
        room.updated_at = Utc::now();

        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE rooms SET name = ?2, relay_url = ?3, relay_token = ?4,
                                  token_expires_at = ?5, deleted = ?6, ttl = ?7,
                                  updated_at = ?8
                 WHERE id = ?1",
                params![
                    room.id.to_string(),
                    room.name,
                    room.relay_url,
                    room.relay_token,
                    room.token_expires_at.map(|t| t.to_rfc3339()),
                    room.deleted as i64,
                    room.ttl.map(|t| t.to_rfc3339()),
                    room.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::Storage(format!("failed to update room: {e}")))?;
        if changed != 1 {
            return Err(StoreError::RoomNotFound(update.id.to_string()));
        }
        Ok(room)
    }

    // ── Grants ───────────────────────────────────────────────────

    /// The rooms an access grant authorizes. Soft-deleted rooms are
    /// always excluded.
    pub fn rooms_from_grant(&self, grant: &AccessGrant) -> StoreResult<Vec<RoomRecord>> {
        let rooms = self.all_rooms()?;
        Ok(resolve_grant_rooms(grant, &rooms)
            .into_iter()
            .cloned()
            .collect())
    }

    /// The room ids an access grant authorizes.
    pub fn room_ids_from_grant(&self, grant: &AccessGrant) -> StoreResult<Vec<RoomId>> {
        Ok(self
            .rooms_from_grant(grant)?
            .into_iter()
            .map(|room| room.id)
            .collect())
    }
}

// ── Row helpers ──────────────────────────────────────────────────

fn read_user_room_ids(conn: &Connection, user_id: &UserId) -> StoreResult<Vec<RoomId>> {
    let ids: Option<String> = conn
        .query_row(
            "SELECT room_ids FROM user_rooms WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(StoreError::Storage(format!(
                "failed to read user room list: {other}"
            ))),
        })?;
    match ids {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

fn write_user_room_ids(conn: &Connection, user_id: &UserId, ids: &[RoomId]) -> StoreResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO user_rooms (user_id, room_ids) VALUES (?1, ?2)",
        params![user_id.to_string(), serde_json::to_string(ids)?],
    )
    .map_err(|e| StoreError::Storage(format!("failed to write user room list: {e}")))?;
    Ok(())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<RoomRecord> {
    let parse_col = |idx: usize, err: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            err.into(),
        )
    };

    let id_str: String = row.get(0)?;
    let collection_str: String = row.get(1)?;
    let name: String = row.get(2)?;
    let alias_seed: String = row.get(3)?;
    let owner_str: String = row.get(4)?;
    let write_access_json: String = row.get(5)?;
    let relay_url: Option<String> = row.get(6)?;
    let relay_token: Option<String> = row.get(7)?;
    let token_expires_str: Option<String> = row.get(8)?;
    let deleted: i64 = row.get(9)?;
    let ttl_str: Option<String> = row.get(10)?;
    let created_str: String = row.get(11)?;
    let updated_str: String = row.get(12)?;

    let id = RoomId::parse(&id_str).map_err(|e| parse_col(0, e.to_string()))?;
    let collection_key = CollectionKey::from_str(&collection_str)
        .map_err(|e| parse_col(1, e.to_string()))?;
    let owner_id = UserId::parse(&owner_str).map_err(|e| parse_col(4, e.to_string()))?;
    let write_access: Vec<UserId> = serde_json::from_str(&write_access_json)
        .map_err(|e| parse_col(5, e.to_string()))?;

    let parse_time = |idx: usize, s: &str| {
        DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| parse_col(idx, e.to_string()))
    };
    let token_expires_at = token_expires_str
        .as_deref()
        .map(|s| parse_time(8, s))
        .transpose()?;
    let ttl = ttl_str.as_deref().map(|s| parse_time(10, s)).transpose()?;
    let created_at = parse_time(11, &created_str)?;
    let updated_at = parse_time(12, &updated_str)?;

    Ok(RoomRecord {
        id,
        collection_key,
        name,
        alias_seed,
        owner_id,
        write_access,
        relay_url,
        relay_token,
        token_expires_at,
        deleted: deleted != 0,
        ttl,
        created_at,
        updated_at,
    })
}
