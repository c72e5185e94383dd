//! Registry discovery and population.
//!
//! The registry is a distinguished, always-connected room whose
//! document holds the directory of every other room the account owns:
//! per collection, a map from alias seed to room identity. The registry
//! counts as *populated* once its `profiles` directory carries a
//! `public` entry — until then no other collection lookup is
//! trustworthy.

use crate::db::Database;
use crate::documents::ROOM_DOCUMENTS_MAP;
use crate::error::{DbError, DbResult};
use crate::events::DbEvent;
use crate::providers::{DocHandle, DocMap as _};
use crate::room::Room;
use hearth_types::{CollectionKey, RoomAlias, RoomId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Alias seed of the well-known registry room.
pub const REGISTRY_ALIAS_SEED: &str = "registry";

/// Directory key of the public profile entry.
pub const PROFILES_PUBLIC_KEY: &str = "public";

/// Key of the directory document inside the registry room's doc.
const REGISTRY_DOC_KEY: &str = "0";

/// One room's entry in the registry directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(rename = "roomAlias")]
    pub room_alias: String,
    #[serde(rename = "roomId", default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}

/// The registry room's document content: per-collection directories of
/// alias seed → room identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryDirectory {
    #[serde(default)]
    pub notes: BTreeMap<String, RegistryEntry>,
    #[serde(default)]
    pub flashcards: BTreeMap<String, RegistryEntry>,
    #[serde(default)]
    pub profiles: BTreeMap<String, RegistryEntry>,
}

impl RegistryDirectory {
    /// The directory for a user collection; `None` for `Registry`
    /// itself, which has no entries of its own.
    #[must_use]
    pub fn collection(&self, key: CollectionKey) -> Option<&BTreeMap<String, RegistryEntry>> {
        match key {
            CollectionKey::Notes => Some(&self.notes),
            CollectionKey::Flashcards => Some(&self.flashcards),
            CollectionKey::Profiles => Some(&self.profiles),
            CollectionKey::Registry => None,
        }
    }

    #[must_use]
    pub fn collection_mut(
        &mut self,
        key: CollectionKey,
    ) -> Option<&mut BTreeMap<String, RegistryEntry>> {
        match key {
            CollectionKey::Notes => Some(&mut self.notes),
            CollectionKey::Flashcards => Some(&mut self.flashcards),
            CollectionKey::Profiles => Some(&mut self.profiles),
            CollectionKey::Registry => None,
        }
    }
}

impl Database {
    /// The registry room, if it is in the table.
    pub async fn registry_room(&self) -> Option<Arc<Room>> {
        self.get_room(CollectionKey::Registry, REGISTRY_ALIAS_SEED).await
    }

    /// Looks up the well-known registry room on the federation,
    /// creating it when absent. Idempotent and race-safe: concurrent
    /// callers converge on one registry.
    pub async fn get_or_create_registry(&self) -> DbResult<(RoomAlias, RoomId)> {
        let owner = self.current_user()?;
        let alias = RoomAlias::build(REGISTRY_ALIAS_SEED, CollectionKey::Registry, &owner)?;

        let _guard = self.registry_lock.lock().await;
        let id = match self.providers.federation.resolve_alias(&alias).await? {
            Some(id) => id,
            None => {
                info!(%alias, "creating registry room");
                self.providers
                    .federation
                    .create_room(&alias, "registry")
                    .await?
            }
        };
        Ok((alias, id))
    }

    /// Gets-or-creates the registry room and connects it (local cache
    /// plus relay when enabled). The registry stays connected for the
    /// life of the database.
    pub async fn connect_registry(&self) -> DbResult<Arc<Room>> {
        let (_, id) = self.get_or_create_registry().await?;
        let owner = self.current_user()?;

        let room = match self.registry_room().await {
            Some(room) => room,
            None => Room::new(
                id,
                CollectionKey::Registry,
                REGISTRY_ALIAS_SEED,
                &owner,
                "registry",
            )?,
        };
        self.insert_room(room.clone()).await;

        self.connect_room(CollectionKey::Registry, REGISTRY_ALIAS_SEED)
            .await
    }

    fn registry_doc(&self, room: &Arc<Room>) -> DbResult<DocHandle> {
        room.doc()
            .ok_or_else(|| DbError::RoomNotFound("registry document is not loaded".into()))
    }

    /// Reads the registry directory from the registry room's document.
    pub async fn registry_directory(&self) -> DbResult<RegistryDirectory> {
        let room = self
            .registry_room()
            .await
            .ok_or_else(|| DbError::RoomNotFound("registry is not loaded".into()))?;
        let doc = self.registry_doc(&room)?;
        match doc.map(ROOM_DOCUMENTS_MAP).get(REGISTRY_DOC_KEY) {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(RegistryDirectory::default()),
        }
    }

    /// Writes the registry directory back into the registry document.
    pub(crate) async fn write_registry_directory(
        &self,
        directory: &RegistryDirectory,
    ) -> DbResult<()> {
        let room = self
            .registry_room()
            .await
            .ok_or_else(|| DbError::RoomNotFound("registry is not loaded".into()))?;
        let doc = self.registry_doc(&room)?;
        doc.map(ROOM_DOCUMENTS_MAP)
            .set(REGISTRY_DOC_KEY, serde_json::to_value(directory)?);
        Ok(())
    }

    /// Records one room under its collection's directory.
    pub(crate) async fn record_room_in_registry(
        &self,
        collection_key: CollectionKey,
        alias_seed: &str,
        alias: &RoomAlias,
        room_id: RoomId,
    ) -> DbResult<()> {
        let mut directory = self.registry_directory().await?;
        let rooms = directory.collection_mut(collection_key).ok_or_else(|| {
            DbError::InvalidRoomDescriptor("registry has no directory for itself".into())
        })?;
        rooms.insert(
            alias_seed.to_string(),
            RegistryEntry {
                room_alias: alias.to_string(),
                room_id: Some(room_id),
            },
        );
        self.write_registry_directory(&directory).await
    }

    /// Whether the registry contains a public profile entry with a
    /// non-empty room alias.
    pub async fn check_registry_populated(&self) -> bool {
        match self.registry_directory().await {
            Ok(directory) => directory
                .profiles
                .get(PROFILES_PUBLIC_KEY)
                .is_some_and(|entry| !entry.room_alias.is_empty()),
            Err(_) => false,
        }
    }

    /// Polls [`Database::check_registry_populated`] until it holds,
    /// failing with `RegistryPopulationTimeout` once `timeout` elapses.
    pub async fn wait_for_registry_populated(
        &self,
        poll_interval: Duration,
        timeout: Duration,
    ) -> DbResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.check_registry_populated().await {
                return Ok(());
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(DbError::RegistryPopulationTimeout);
            }
            // Never sleep past the deadline.
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }

    /// [`Database::wait_for_registry_populated`] with the configured
    /// default interval and timeout.
    pub async fn wait_for_registry_populated_default(&self) -> DbResult<()> {
        self.wait_for_registry_populated(
            self.config.registry_poll_interval,
            self.config.registry_timeout,
        )
        .await
    }

    /// Creates the public profile room (when missing) and writes its
    /// alias into the registry under `profiles.public`.
    ///
    /// Emits `starting populateRegistry`, `created profile room`,
    /// `populated registry` — in that order; consumers treat the third
    /// as the completion signal.
    pub async fn populate_registry(&self, profile_room_name: &str) -> DbResult<()> {
        self.emit(&DbEvent::new("populateRegistry").with_message("starting populateRegistry"));

        let owner = self.current_user()?;
        // The registry document must be loaded before it can be written.
        let registry_room = self
            .registry_room()
            .await
            .filter(|room| room.is_local_loaded())
            .ok_or_else(|| DbError::RoomNotFound("registry is not loaded".into()))?;
        debug!(registry = %registry_room.alias, "populating registry");

        let alias = RoomAlias::build(PROFILES_PUBLIC_KEY, CollectionKey::Profiles, &owner)?;
        let id = match self.providers.federation.resolve_alias(&alias).await? {
            Some(id) => id,
            None => {
                self.providers
                    .federation
                    .create_room(&alias, profile_room_name)
                    .await?
            }
        };
        self.emit(&DbEvent::new("populateRegistry").with_message("created profile room"));

        let mut directory = self.registry_directory().await?;
        directory.profiles.insert(
            PROFILES_PUBLIC_KEY.to_string(),
            RegistryEntry {
                room_alias: alias.to_string(),
                room_id: Some(id),
            },
        );
        self.write_registry_directory(&directory).await?;
        self.emit(&DbEvent::new("populateRegistry").with_message("populated registry"));
        Ok(())
    }
}
