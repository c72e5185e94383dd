//! Room connection orchestration.
//!
//! Brings a single room from "unknown" to "synchronized": attaches the
//! local durable provider, then (when relay credentials are present)
//! runs the token-refresh-and-connect sequence and keeps a watcher task
//! on the relay's event stream. Relay failures degrade to
//! `Disconnected` behind a bounded retry loop; local storage failures
//! always propagate.

use crate::db::Database;
use crate::error::{DbError, DbResult};
use crate::events::{DbEvent, EventLevel};
use crate::providers::RelayEvent;
use crate::room::{ConnectStatus, Room, MAX_CONNECTION_RETRIES};
use hearth_types::RoomRecord;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

impl Database {
    /// Loads a room from a server-side record: local durable state
    /// first, then the remote relay when the record carries a usable
    /// token. Idempotent — reloading a fully-loaded room is a no-op
    /// that attaches nothing and emits nothing.
    pub async fn load_room(&self, record: &RoomRecord) -> DbResult<Arc<Room>> {
        if record.id.is_nil() {
            return Err(DbError::InvalidRoomDescriptor("room id is nil".into()));
        }
        if record.alias_seed.is_empty() {
            return Err(DbError::InvalidRoomDescriptor("alias seed is empty".into()));
        }

        let room = match self.get_room(record.collection_key, &record.alias_seed).await {
            Some(room) => room,
            None => Room::from_record(record)?,
        };
        room.validate()?;

        // One connect sequence per room at a time.
        let _guard = room.connect_lock.lock().await;

        // Adopt the record's token when the room has none yet.
        if room.token().is_none() {
            room.set_token(record.token());
        }

        let local_loaded = room.is_local_loaded();
        let should_load_remote = self.config.use_relay && room.token().is_some();
        let remote_loaded = room.is_remote_loaded();
        debug!(
            room = %room.alias,
            local_loaded,
            should_load_remote,
            remote_loaded,
            "room loaded state"
        );

        if local_loaded && (!should_load_remote || remote_loaded) {
            debug!(room = %room.alias, "room already loaded");
            drop(_guard);
            return Ok(room);
        }

        if !local_loaded {
            self.load_local(&room).await?;
        }

        if should_load_remote && !remote_loaded {
            match self.open_relay(&room).await {
                Ok(rx) => self.spawn_relay_watcher(&room, Some(rx)),
                Err(err) => {
                    self.note_relay_failure(&room, &err.to_string());
                    // Keep retrying from the watcher task.
                    self.spawn_relay_watcher(&room, None);
                }
            }
        }

        self.insert_room(room.clone()).await;
        self.emit(&DbEvent::new("roomLoaded").with_data(json!({
            "alias": room.alias.to_string(),
            "collectionKey": room.collection_key,
        })));
        drop(_guard);
        Ok(room)
    }

    /// Attaches the local durable provider. Failures here indicate an
    /// environment problem and are fatal to the caller — no retry.
    async fn load_local(&self, room: &Arc<Room>) -> DbResult<()> {
        room.set_status(ConnectStatus::Loading);
        let (doc, local) = self
            .providers
            .local
            .attach(&room.storage_key(), room.doc())
            .await?;
        room.attach_local(doc, local);
        debug!(room = %room.alias, "attached local provider");
        Ok(())
    }

    /// The token-refresh-and-connect sequence. Emits `connecting`,
    /// refreshes an expired token (falling back to the stale one when
    /// the issuer fails), opens the relay connection, and returns its
    /// event stream.
    async fn open_relay(&self, room: &Arc<Room>) -> DbResult<UnboundedReceiver<RelayEvent>> {
        self.emit_connection_change(room, ConnectStatus::Connecting);

        if let Some(token) = room.token() {
            if token.is_expired() {
                match self.providers.credentials.issue(&room.id).await {
                    Ok(fresh) => {
                        debug!(room = %room.alias, "refreshed relay token");
                        room.set_token(Some(fresh));
                    }
                    Err(err) => {
                        // Deliberate: connect with the stale token and let
                        // the relay's rejection drive the retry path.
                        warn!(room = %room.alias, %err, "token refresh failed, using stale token");
                        self.emit_diag(
                            "refreshToken",
                            EventLevel::Warn,
                            format!("token refresh failed, using stale token: {err}"),
                        );
                    }
                }
            }
        }

        let token = room
            .token()
            .ok_or_else(|| DbError::RelayConnection("no relay token".into()))?;
        let doc = room
            .doc()
            .ok_or_else(|| DbError::RelayConnection("no local document".into()))?;

        let remote = self
            .providers
            .relay
            .connect(&token.url, &token.token, &room.id, doc)
            .await?;
        let rx = remote.subscribe();
        room.attach_remote(remote)?;
        Ok(rx)
    }

    /// Spawns the watcher task that drives the room's status from the
    /// relay event stream and owns the bounded reconnect loop.
    fn spawn_relay_watcher(&self, room: &Arc<Room>, rx: Option<UnboundedReceiver<RelayEvent>>) {
        let db = self.clone();
        let task_room = room.clone();
        let handle = tokio::spawn(async move { db.relay_watcher_loop(task_room, rx).await });
        room.set_watcher(handle);
    }

    /// The watcher: forwards relay events as status transitions and
    /// re-runs the token-refresh-and-connect sequence after connection
    /// errors, at most [`MAX_CONNECTION_RETRIES`] times with a fixed
    /// backoff. Once the budget is spent the room stays `Disconnected`
    /// until the caller explicitly reconnects.
    async fn relay_watcher_loop(
        self,
        room: Arc<Room>,
        initial: Option<UnboundedReceiver<RelayEvent>>,
    ) {
        let mut next_rx = initial;
        loop {
            let mut rx = match next_rx.take() {
                Some(rx) => rx,
                None => {
                    if room.connection_retries() >= MAX_CONNECTION_RETRIES {
                        info!(room = %room.alias, "relay retry budget exhausted");
                        self.emit_diag(
                            "roomConnectionChange",
                            EventLevel::Warn,
                            format!("retry budget exhausted for {}", room.alias),
                        );
                        return;
                    }
                    tokio::time::sleep(self.config.retry_backoff).await;
                    let attempt = room.bump_retries();
                    debug!(room = %room.alias, attempt, "relay reconnect attempt");
                    match self.open_relay(&room).await {
                        Ok(rx) => rx,
                        Err(err) => {
                            self.note_relay_failure(&room, &err.to_string());
                            continue;
                        }
                    }
                }
            };

            let mut retry = false;
            while let Some(event) = rx.recv().await {
                match event {
                    RelayEvent::Status(status) => self.emit_connection_change(&room, status),
                    RelayEvent::Sync(true) => {
                        self.emit_connection_change(&room, ConnectStatus::Connected)
                    }
                    RelayEvent::Sync(false) => {
                        self.emit_connection_change(&room, ConnectStatus::Disconnected)
                    }
                    RelayEvent::ConnectionError(reason) => {
                        self.note_relay_failure(&room, &reason);
                        retry = true;
                        break;
                    }
                }
            }
            if !retry {
                // Stream closed without an error: the connection was
                // torn down deliberately.
                return;
            }
        }
    }

    /// Records a relay failure: diagnostic event plus a `Disconnected`
    /// status transition.
    fn note_relay_failure(&self, room: &Arc<Room>, reason: &str) {
        warn!(room = %room.alias, reason, "relay connection error");
        self.emit_diag(
            "relayConnection",
            EventLevel::Error,
            format!("{}: {reason}", room.alias),
        );
        self.emit_connection_change(room, ConnectStatus::Disconnected);
    }

    /// Applies a status transition and fans it out — the room's own
    /// listeners first, then the database-level bus.
    pub(crate) fn emit_connection_change(&self, room: &Arc<Room>, status: ConnectStatus) {
        if status == ConnectStatus::Connected {
            room.reset_retries();
        }
        room.set_status(status);
        let event = DbEvent::new("roomConnectionChange").with_data(json!({
            "status": status,
            "alias": room.alias.to_string(),
            "collectionKey": room.collection_key,
        }));
        room.bus().emit(&event);
        self.emit(&event);
    }

    /// Tears down the room's remote connection: aborts the watcher
    /// (cancelling any pending retry), closes the relay, and emits a
    /// final `Disconnected`. No-op for rooms without an active remote.
    pub(crate) async fn disconnect(&self, room: &Arc<Room>) {
        room.abort_watcher();
        if let Some(remote) = room.detach_remote() {
            if let Err(err) = remote.disconnect().await {
                warn!(room = %room.alias, %err, "relay disconnect failed");
            }
            self.emit_connection_change(room, ConnectStatus::Disconnected);
        }
    }
}
