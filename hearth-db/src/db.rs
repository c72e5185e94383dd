//! The database facade.
//!
//! `Database` owns the in-memory table of rooms per collection and is
//! the sole mutator of that table and of the registry. Every lifecycle
//! operation (`load`, `connect_room`, `create_and_connect_room`,
//! `disconnect_room`) goes through it.

use crate::auth::LoginStatus;
use crate::error::{DbError, DbResult};
use crate::events::{DbEvent, EventBus, EventLevel, ListenerError, ListenerHandle};
use crate::providers::ProviderSet;
use crate::room::Room;
use hearth_types::{random_seed, CollectionKey, NewRoomDescriptor, RoomAlias, RoomId, RoomRecord, UserId};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Tunables for a database instance.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Homeserver of the federated room transport.
    pub homeserver: String,
    /// Whether rooms connect to the remote relay at all.
    pub use_relay: bool,
    /// Fixed backoff between relay reconnection attempts.
    pub retry_backoff: Duration,
    /// Default poll interval for `wait_for_registry_populated`.
    pub registry_poll_interval: Duration,
    /// Default timeout for `wait_for_registry_populated`.
    pub registry_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            homeserver: "http://localhost:8008".to_string(),
            use_relay: true,
            retry_backoff: Duration::from_secs(1),
            registry_poll_interval: Duration::from_secs(1),
            registry_timeout: Duration::from_secs(30),
        }
    }
}

type RoomTable = HashMap<CollectionKey, HashMap<String, Arc<Room>>>;

/// The local-first room database.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Database {
    pub(crate) config: Arc<DatabaseConfig>,
    pub(crate) providers: Arc<ProviderSet>,
    collections: Arc<RwLock<RoomTable>>,
    bus: Arc<EventBus>,
    login_status: Arc<StdRwLock<LoginStatus>>,
    user_id: Arc<StdRwLock<Option<UserId>>>,
    /// Serializes registry get-or-create so racing callers converge.
    pub(crate) registry_lock: Arc<Mutex<()>>,
}

impl Database {
    /// Creates a database over the given provider set.
    #[must_use]
    pub fn new(config: DatabaseConfig, providers: ProviderSet) -> Self {
        let mut table = RoomTable::new();
        for key in CollectionKey::ALL {
            table.insert(key, HashMap::new());
        }
        Self {
            config: Arc::new(config),
            providers: Arc::new(providers),
            collections: Arc::new(RwLock::new(table)),
            bus: Arc::new(EventBus::new()),
            login_status: Arc::new(StdRwLock::new(LoginStatus::Initial)),
            user_id: Arc::new(StdRwLock::new(None)),
            registry_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    // ── Event bus ────────────────────────────────────────────────

    /// The database-level event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Registers a fallible listener on the database bus.
    pub fn on<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&DbEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.bus.on(listener)
    }

    /// Registers an infallible listener on the database bus.
    pub fn on_event<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&DbEvent) + Send + Sync + 'static,
    {
        self.bus.on_event(listener)
    }

    pub fn off(&self, handle: ListenerHandle) -> bool {
        self.bus.off(handle)
    }

    pub fn emit(&self, event: &DbEvent) {
        self.bus.emit(event);
    }

    /// Emits an internal diagnostic event so swallowed failures stay
    /// observable.
    pub(crate) fn emit_diag(&self, event: &str, level: EventLevel, message: impl Into<String>) {
        self.bus
            .emit(&DbEvent::new(event).with_level(level).with_message(message));
    }

    // ── Identity ─────────────────────────────────────────────────

    /// The logged-in user, if any.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id.read().unwrap().clone()
    }

    pub(crate) fn set_user_id(&self, user_id: Option<UserId>) {
        *self.user_id.write().unwrap() = user_id;
    }

    /// The logged-in user, or `NotLoggedIn`.
    pub(crate) fn current_user(&self) -> DbResult<UserId> {
        self.user_id().ok_or(DbError::NotLoggedIn)
    }

    pub fn login_status(&self) -> LoginStatus {
        *self.login_status.read().unwrap()
    }

    pub(crate) fn store_login_status(&self, status: LoginStatus) {
        *self.login_status.write().unwrap() = status;
    }

    // ── Room table ───────────────────────────────────────────────

    /// Looks up a room by collection and alias seed.
    pub async fn get_room(&self, collection_key: CollectionKey, alias_seed: &str) -> Option<Arc<Room>> {
        self.collections
            .read()
            .await
            .get(&collection_key)
            .and_then(|rooms| rooms.get(alias_seed))
            .cloned()
    }

    /// Returns the existing room for `(collection, seed)` or registers
    /// a new empty one owned by the current user.
    pub async fn get_or_set_room(
        &self,
        collection_key: CollectionKey,
        alias_seed: &str,
    ) -> DbResult<Arc<Room>> {
        if let Some(room) = self.get_room(collection_key, alias_seed).await {
            return Ok(room);
        }
        let owner = self.current_user()?;
        let room = Room::new(
            RoomId::new(),
            collection_key,
            alias_seed,
            &owner,
            alias_seed,
        )?;
        self.insert_room(room.clone()).await;
        Ok(room)
    }

    /// All rooms of a collection.
    pub async fn rooms(&self, collection_key: CollectionKey) -> Vec<Arc<Room>> {
        self.collections
            .read()
            .await
            .get(&collection_key)
            .map(|rooms| rooms.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) async fn insert_room(&self, room: Arc<Room>) {
        self.collections
            .write()
            .await
            .entry(room.collection_key)
            .or_default()
            .insert(room.alias_seed.clone(), room.clone());
    }

    pub(crate) async fn remove_room(
        &self,
        collection_key: CollectionKey,
        alias_seed: &str,
    ) -> Option<Arc<Room>> {
        self.collections
            .write()
            .await
            .get_mut(&collection_key)
            .and_then(|rooms| rooms.remove(alias_seed))
    }

    // ── Lifecycle operations ─────────────────────────────────────

    /// Loads every record, failing fast on the first error.
    pub async fn load(&self, records: &[RoomRecord]) -> DbResult<Vec<Arc<Room>>> {
        let mut rooms = Vec::with_capacity(records.len());
        for record in records {
            rooms.push(self.load_room(record).await?);
        }
        Ok(rooms)
    }

    /// Connects a known room — from the table, the registry directory,
    /// or the federation — provisioning a relay token when needed.
    ///
    /// An explicit connect resets the retry budget and tears down any
    /// stale remote attachment, so a room stuck at the retry cap can be
    /// brought back by calling this.
    pub async fn connect_room(
        &self,
        collection_key: CollectionKey,
        alias_seed: &str,
    ) -> DbResult<Arc<Room>> {
        let room = match self.get_room(collection_key, alias_seed).await {
            Some(room) => room,
            None => {
                let room = self.room_from_directory(collection_key, alias_seed).await?;
                self.insert_room(room.clone()).await;
                room
            }
        };

        room.reset_retries();
        if room.status() != crate::room::ConnectStatus::Connected {
            room.abort_watcher();
            if let Some(remote) = room.detach_remote() {
                let _ = remote.disconnect().await;
            }
        }

        if self.config.use_relay && room.token().is_none() {
            match self.providers.credentials.issue(&room.id).await {
                Ok(token) => room.set_token(Some(token)),
                Err(err) => {
                    warn!(room = %room.alias, %err, "token provisioning failed; connecting local-only");
                    self.emit_diag(
                        "connectRoom",
                        EventLevel::Warn,
                        format!("token provisioning failed: {err}"),
                    );
                }
            }
        }

        let record = self.record_for_room(&room);
        self.load_room(&record).await
    }

    /// Builds a room object from the registry directory or by resolving
    /// the alias against the federation.
    async fn room_from_directory(
        &self,
        collection_key: CollectionKey,
        alias_seed: &str,
    ) -> DbResult<Arc<Room>> {
        let owner = self.current_user()?;
        let alias = RoomAlias::build(alias_seed, collection_key, &owner)?;

        let registry_id = match self.registry_directory().await {
            Ok(directory) => directory
                .collection(collection_key)
                .and_then(|rooms| rooms.get(alias_seed))
                .and_then(|entry| entry.room_id),
            Err(_) => None,
        };
        let id = match registry_id {
            Some(id) => id,
            None => self
                .providers
                .federation
                .resolve_alias(&alias)
                .await?
                .ok_or_else(|| DbError::RoomNotFound(alias.to_string()))?,
        };

        let name = self
            .providers
            .federation
            .room_name(&id)
            .await?
            .unwrap_or_else(|| alias_seed.to_string());
        Room::new(id, collection_key, alias_seed, &owner, &name)
    }

    /// Snapshot of a room as a server-side record.
    pub(crate) fn record_for_room(&self, room: &Arc<Room>) -> RoomRecord {
        let owner = room.alias.owner().clone();
        let mut record = RoomRecord::new(
            room.collection_key,
            room.name(),
            room.alias_seed.clone(),
            owner,
        );
        record.id = room.id;
        if let Some(token) = room.token() {
            record.set_token(&token);
        }
        record
    }

    /// Creates a room on the federation, provisions its relay token,
    /// connects it, and records it in the registry directory.
    pub async fn create_and_connect_room(
        &self,
        descriptor: NewRoomDescriptor,
    ) -> DbResult<Arc<Room>> {
        let owner = self.current_user()?;
        let seed = descriptor
            .alias_seed
            .clone()
            .unwrap_or_else(|| random_seed(12));
        let alias = RoomAlias::build(&seed, descriptor.collection_key, &owner)?;

        let id = match self.providers.federation.resolve_alias(&alias).await? {
            Some(id) => id,
            None => {
                self.providers
                    .federation
                    .create_room(&alias, &descriptor.name)
                    .await?
            }
        };

        let mut record = RoomRecord::new(descriptor.collection_key, &descriptor.name, &seed, owner);
        record.id = id;
        record.ttl = descriptor.ttl;
        if self.config.use_relay {
            match self.providers.credentials.issue(&id).await {
                Ok(token) => record.set_token(&token),
                Err(err) => {
                    warn!(%alias, %err, "token provisioning failed; connecting local-only");
                    self.emit_diag(
                        "createAndConnectRoom",
                        EventLevel::Warn,
                        format!("token provisioning failed: {err}"),
                    );
                }
            }
        }

        let room = self.load_room(&record).await?;

        if descriptor.collection_key != CollectionKey::Registry {
            if let Err(err) = self
                .record_room_in_registry(descriptor.collection_key, &seed, &alias, id)
                .await
            {
                debug!(%alias, %err, "room not recorded in registry");
                self.emit_diag(
                    "createAndConnectRoom",
                    EventLevel::Warn,
                    format!("room not recorded in registry: {err}"),
                );
            }
        }

        self.emit(
            &DbEvent::new("createAndConnectRoom")
                .with_data(json!({ "alias": alias.to_string(), "roomId": id })),
        );
        Ok(room)
    }

    /// Tears down a room's remote connection and removes it from the
    /// table. Safe to call on rooms without an active remote (no-op).
    pub async fn disconnect_room(
        &self,
        collection_key: CollectionKey,
        alias_seed: &str,
    ) -> DbResult<()> {
        let Some(room) = self.get_room(collection_key, alias_seed).await else {
            return Ok(());
        };
        self.disconnect(&room).await;
        // The room leaves the table, so release its local cache handle.
        if let Some(local) = room.detach_local() {
            if let Err(err) = local.detach().await {
                warn!(room = %room.alias, %err, "local detach failed");
            }
        }
        self.remove_room(collection_key, alias_seed).await;
        Ok(())
    }

    /// Renames a room, posting the new name to the federation's room
    /// metadata.
    pub async fn rename_room(
        &self,
        collection_key: CollectionKey,
        alias_seed: &str,
        name: &str,
    ) -> DbResult<()> {
        let room = self
            .get_room(collection_key, alias_seed)
            .await
            .ok_or_else(|| DbError::RoomNotFound(format!("{collection_key}/{alias_seed}")))?;
        self.providers
            .federation
            .set_room_name(&room.id, name)
            .await?;
        room.set_name(name);
        self.emit(
            &DbEvent::new("roomRenamed")
                .with_data(json!({ "alias": room.alias.to_string(), "name": name })),
        );
        Ok(())
    }

    /// Disconnects every room and clears the table.
    pub async fn shutdown(&self) {
        let rooms: Vec<Arc<Room>> = {
            let mut table = self.collections.write().await;
            let mut drained = Vec::new();
            for collection in table.values_mut() {
                drained.extend(collection.drain().map(|(_, room)| room));
            }
            drained
        };
        for room in rooms {
            self.disconnect(&room).await;
        }
        debug!("database shut down");
    }
}
