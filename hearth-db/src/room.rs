//! In-memory room state.
//!
//! A `Room` is one replicated document channel: its identity, its
//! relay credentials, its connection state machine, and its transport
//! attachment. Rooms are created the first time they are referenced and
//! live in the database facade's table until explicitly disconnected.

use crate::error::{DbError, DbResult};
use crate::events::EventBus;
use crate::providers::{DocHandle, LocalProvider, RelayProvider};
use hearth_types::{CollectionKey, RelayToken, RoomAlias, RoomId, RoomRecord, UserId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Retry budget for relay reconnection attempts.
pub const MAX_CONNECTION_RETRIES: u8 = 3;

/// Per-room connection state machine.
///
/// `Failed` is terminal until the caller explicitly reconnects; every
/// other state is re-enterable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectStatus {
    #[default]
    Initial,
    Loading,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl std::fmt::Display for ConnectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectStatus::Initial => "initial",
            ConnectStatus::Loading => "loading",
            ConnectStatus::Connecting => "connecting",
            ConnectStatus::Connected => "connected",
            ConnectStatus::Disconnected => "disconnected",
            ConnectStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The room's transport attachment.
///
/// Remote-without-local is unrepresentable: the relay can only be
/// attached on top of an existing local attachment.
#[derive(Default)]
pub enum Attachment {
    #[default]
    Unattached,
    LocalOnly {
        doc: DocHandle,
        local: Arc<dyn LocalProvider>,
    },
    LocalAndRemote {
        doc: DocHandle,
        local: Arc<dyn LocalProvider>,
        remote: Arc<dyn RelayProvider>,
    },
}

impl Attachment {
    /// The document handle, if locally attached.
    #[must_use]
    pub fn doc(&self) -> Option<DocHandle> {
        match self {
            Attachment::Unattached => None,
            Attachment::LocalOnly { doc, .. } | Attachment::LocalAndRemote { doc, .. } => {
                Some(doc.clone())
            }
        }
    }

    /// The relay provider, if remotely attached.
    #[must_use]
    pub fn remote(&self) -> Option<Arc<dyn RelayProvider>> {
        match self {
            Attachment::LocalAndRemote { remote, .. } => Some(remote.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_local_loaded(&self) -> bool {
        !matches!(self, Attachment::Unattached)
    }
}

/// One replicated document channel.
pub struct Room {
    pub id: RoomId,
    pub collection_key: CollectionKey,
    pub alias_seed: String,
    pub alias: RoomAlias,
    name: RwLock<String>,
    token: RwLock<Option<RelayToken>>,
    status: RwLock<ConnectStatus>,
    retries: AtomicU8,
    attachment: Mutex<Attachment>,
    bus: EventBus,
    /// Serializes connect sequences for this room (single-flight).
    pub(crate) connect_lock: tokio::sync::Mutex<()>,
    /// Relay watcher task, aborted on disconnect.
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Room {
    /// Creates an empty, unattached room from its identity.
    pub fn new(
        id: RoomId,
        collection_key: CollectionKey,
        alias_seed: &str,
        owner: &UserId,
        name: &str,
    ) -> DbResult<Arc<Self>> {
        let alias = RoomAlias::build(alias_seed, collection_key, owner)?;
        Ok(Arc::new(Self {
            id,
            collection_key,
            alias_seed: alias_seed.to_string(),
            alias,
            name: RwLock::new(name.to_string()),
            token: RwLock::new(None),
            status: RwLock::new(ConnectStatus::Initial),
            retries: AtomicU8::new(0),
            attachment: Mutex::new(Attachment::Unattached),
            bus: EventBus::new(),
            connect_lock: tokio::sync::Mutex::new(()),
            watcher: Mutex::new(None),
        }))
    }

    /// Creates a room from a server-side record, adopting its token.
    pub fn from_record(record: &RoomRecord) -> DbResult<Arc<Self>> {
        let room = Self::new(
            record.id,
            record.collection_key,
            &record.alias_seed,
            &record.owner_id,
            &record.name,
        )?;
        *room.token.write().unwrap() = record.token();
        Ok(room)
    }

    /// Validates that the room's identity is usable for connection.
    pub fn validate(&self) -> DbResult<()> {
        if self.id.is_nil() {
            return Err(DbError::InvalidRoomDescriptor("room id is nil".into()));
        }
        if self.alias_seed.is_empty() {
            return Err(DbError::InvalidRoomDescriptor("alias seed is empty".into()));
        }
        Ok(())
    }

    /// The key the local durable provider stores this room's doc under.
    #[must_use]
    pub fn storage_key(&self) -> String {
        self.id.to_string()
    }

    pub fn name(&self) -> String {
        self.name.read().unwrap().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.write().unwrap() = name.to_string();
    }

    pub fn token(&self) -> Option<RelayToken> {
        self.token.read().unwrap().clone()
    }

    pub fn set_token(&self, token: Option<RelayToken>) {
        *self.token.write().unwrap() = token;
    }

    pub fn status(&self) -> ConnectStatus {
        *self.status.read().unwrap()
    }

    pub(crate) fn set_status(&self, status: ConnectStatus) {
        *self.status.write().unwrap() = status;
    }

    /// Bounded reconnect counter. Reset on every successful connection.
    pub fn connection_retries(&self) -> u8 {
        self.retries.load(Ordering::SeqCst)
    }

    pub(crate) fn reset_retries(&self) {
        self.retries.store(0, Ordering::SeqCst);
    }

    pub(crate) fn bump_retries(&self) -> u8 {
        self.retries.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The room's own event bus. Room events are also forwarded to the
    /// database-level bus by the orchestrator.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The document handle, if locally attached.
    pub fn doc(&self) -> Option<DocHandle> {
        self.attachment.lock().unwrap().doc()
    }

    pub fn is_local_loaded(&self) -> bool {
        self.attachment.lock().unwrap().is_local_loaded()
    }

    /// Whether a live remote attachment matches the room's current
    /// token (same token string, not expired).
    pub fn is_remote_loaded(&self) -> bool {
        let attachment = self.attachment.lock().unwrap();
        let Some(remote) = attachment.remote() else {
            return false;
        };
        match self.token() {
            Some(token) => remote.token() == token.token && !token.is_expired(),
            None => false,
        }
    }

    /// Replaces the attachment with a local-only one, keeping any
    /// document passed in.
    pub(crate) fn attach_local(&self, doc: DocHandle, local: Arc<dyn LocalProvider>) {
        *self.attachment.lock().unwrap() = Attachment::LocalOnly { doc, local };
    }

    /// Upgrades a local attachment with a relay connection.
    pub(crate) fn attach_remote(&self, remote: Arc<dyn RelayProvider>) -> DbResult<()> {
        let mut attachment = self.attachment.lock().unwrap();
        *attachment = match std::mem::take(&mut *attachment) {
            Attachment::LocalOnly { doc, local }
            | Attachment::LocalAndRemote { doc, local, .. } => Attachment::LocalAndRemote {
                doc,
                local,
                remote,
            },
            Attachment::Unattached => {
                return Err(DbError::InvalidRoomDescriptor(
                    "cannot attach relay before local storage".into(),
                ))
            }
        };
        Ok(())
    }

    /// Tears down the whole attachment, returning the local provider so
    /// the caller can flush it. Must only run after the remote side is
    /// detached.
    pub(crate) fn detach_local(&self) -> Option<Arc<dyn LocalProvider>> {
        let mut attachment = self.attachment.lock().unwrap();
        match std::mem::take(&mut *attachment) {
            Attachment::LocalOnly { local, .. } | Attachment::LocalAndRemote { local, .. } => {
                Some(local)
            }
            Attachment::Unattached => None,
        }
    }

    /// Downgrades to local-only, returning the detached relay provider.
    pub(crate) fn detach_remote(&self) -> Option<Arc<dyn RelayProvider>> {
        let mut attachment = self.attachment.lock().unwrap();
        match std::mem::take(&mut *attachment) {
            Attachment::LocalAndRemote { doc, local, remote } => {
                *attachment = Attachment::LocalOnly { doc, local };
                Some(remote)
            }
            other => {
                *attachment = other;
                None
            }
        }
    }

    pub(crate) fn set_watcher(&self, handle: JoinHandle<()>) {
        // A replaced watcher is aborted so stale relay streams cannot
        // drive status transitions.
        if let Some(old) = self.watcher.lock().unwrap().replace(handle) {
            old.abort();
        }
    }

    /// Aborts the relay watcher, cancelling any in-flight retry timer.
    pub(crate) fn abort_watcher(&self) {
        if let Some(handle) = self.watcher.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("collection_key", &self.collection_key)
            .field("alias", &self.alias.to_string())
            .field("status", &self.status())
            .field("retries", &self.connection_retries())
            .finish()
    }
}

impl Drop for Room {
    fn drop(&mut self) {
        if let Some(handle) = self.watcher.lock().unwrap().take() {
            handle.abort();
        }
    }
}
