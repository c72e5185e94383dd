//! Local-first room replication core for Hearth.
//!
//! Keeps a set of logical "rooms" — units of shared, replicated
//! document state — synchronized across a durable local cache and a
//! remote relay transport, while a distinguished "registry" room tracks
//! which rooms exist for an account.
//!
//! # Architecture
//!
//! - **Providers**: trait boundaries for everything external — the
//!   CRDT document primitive, the local durable provider, the remote
//!   relay, the federated room transport, and the credential issuer
//! - **Room**: per-room connection state machine and transport
//!   attachment
//! - **Connection**: the orchestrator that brings a room from
//!   "unknown" to "synchronized", with token refresh and bounded retry
//! - **Registry**: discovery and population of the room directory
//! - **Events**: the typed bus that makes all of the above observable
//! - **Database**: the facade owning the room table and the public
//!   lifecycle operations
//!
//! # Example
//!
//! ```no_run
//! use hearth_db::providers::mock::MockProviders;
//! use hearth_db::{Database, DatabaseConfig, LoginData};
//!
//! # async fn run() -> hearth_db::DbResult<()> {
//! let mocks = MockProviders::new();
//! mocks.federation.seed_account("alice", "secret");
//!
//! let db = Database::new(DatabaseConfig::default(), mocks.provider_set());
//! db.login(&LoginData {
//!     username: "alice".into(),
//!     password: "secret".into(),
//! })
//! .await?;
//! db.connect_registry().await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod connection;
mod db;
mod documents;
mod error;
pub mod events;
pub mod providers;
mod registry;
mod room;

pub use auth::{validate_username, LoginData, LoginStatus};
pub use db::{Database, DatabaseConfig};
pub use documents::ROOM_DOCUMENTS_MAP;
pub use error::{DbError, DbResult};
pub use events::{DbEvent, EventBus, EventLevel, ListenerError, ListenerHandle};
pub use providers::{
    CredentialIssuer, DocHandle, DocMap, Federation, LocalProvider, LocalProviderFactory,
    ProviderSet, RelayEvent, RelayProvider, RelayProviderFactory, SharedDoc,
};
pub use registry::{
    RegistryDirectory, RegistryEntry, PROFILES_PUBLIC_KEY, REGISTRY_ALIAS_SEED,
};
pub use room::{Attachment, ConnectStatus, Room, MAX_CONNECTION_RETRIES};
