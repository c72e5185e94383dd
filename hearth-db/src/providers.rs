//! Provider layer abstraction.
//!
//! The replication core does not speak any concrete wire protocol or
//! storage format. Everything it consumes — the CRDT document primitive,
//! the local durable cache, the remote relay, the federated room server,
//! and the credential issuer — is defined here as a trait, so the core
//! works with any backend. The `mock` module carries in-memory
//! implementations used throughout the tests.

use crate::error::{DbError, DbResult};
use crate::room::ConnectStatus;
use async_trait::async_trait;
use hearth_types::{RelayToken, RoomAlias, RoomId, UserId};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

// ── CRDT document primitive ──────────────────────────────────────

/// A named mapped container inside a shared document.
///
/// Entries hold arbitrary serializable values; merge semantics are the
/// document implementation's concern.
pub trait DocMap: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn remove(&self, key: &str) -> Option<Value>;
    fn clear(&self);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn keys(&self) -> Vec<String>;
}

/// A shared, mergeable document.
pub trait SharedDoc: Send + Sync {
    /// Returns the named mapped container, creating it if absent.
    fn map(&self, name: &str) -> Arc<dyn DocMap>;
}

/// Shared handle to one document instance.
pub type DocHandle = Arc<dyn SharedDoc>;

// ── Local durable provider ───────────────────────────────────────

/// Attached persistent local storage for one document.
#[async_trait]
pub trait LocalProvider: Send + Sync {
    /// The storage key the provider was attached under.
    fn storage_key(&self) -> &str;

    /// Detaches the provider, flushing any pending state.
    async fn detach(&self) -> DbResult<()>;
}

/// Attaches durable local storage to documents.
#[async_trait]
pub trait LocalProviderFactory: Send + Sync {
    /// Attaches local storage under `storage_key`, loading persisted
    /// state into `doc` — or into a newly created document when `doc`
    /// is `None`. Attach failures are fatal to the caller.
    async fn attach(
        &self,
        storage_key: &str,
        doc: Option<DocHandle>,
    ) -> DbResult<(DocHandle, Arc<dyn LocalProvider>)>;
}

// ── Remote relay provider ────────────────────────────────────────

/// Connection-lifecycle events emitted by a relay connection.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// Transport-level status change, forwarded verbatim.
    Status(ConnectStatus),
    /// Document sync state: `true` once the replica converged.
    Sync(bool),
    /// The connection failed; carries the transport's reason.
    ConnectionError(String),
}

/// An open duplex connection streaming document updates to a relay.
#[async_trait]
pub trait RelayProvider: Send + Sync {
    /// The token this connection was opened with.
    fn token(&self) -> &str;

    /// Subscribes to the connection's event stream.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<RelayEvent>;

    /// Closes the connection. Idempotent.
    async fn disconnect(&self) -> DbResult<()>;
}

/// Opens relay connections bound to documents.
#[async_trait]
pub trait RelayProviderFactory: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        token: &str,
        doc_id: &RoomId,
        doc: DocHandle,
    ) -> DbResult<Arc<dyn RelayProvider>>;
}

// ── Federated room transport ─────────────────────────────────────

/// The federated room server: account registration plus room
/// creation/resolution by alias.
#[async_trait]
pub trait Federation: Send + Sync {
    /// Authenticates and returns an access token.
    /// Fails with [`DbError::AuthenticationFailed`] on bad credentials.
    async fn login(&self, user_id: &UserId, password: &str) -> DbResult<String>;

    /// Registers a new account.
    /// Fails with [`DbError::UserAlreadyExists`] when taken.
    async fn register(&self, username: &str, password: &str) -> DbResult<()>;

    /// Resolves an alias to the room id it names, if any.
    async fn resolve_alias(&self, alias: &RoomAlias) -> DbResult<Option<RoomId>>;

    /// Creates a room under the alias and returns its id.
    /// Racing creators converge: when the alias was concurrently taken,
    /// the existing room's id is returned.
    async fn create_room(&self, alias: &RoomAlias, name: &str) -> DbResult<RoomId>;

    /// Fetches a room's display name from its metadata.
    async fn room_name(&self, room_id: &RoomId) -> DbResult<Option<String>>;

    /// Posts a room's display name to its metadata.
    async fn set_room_name(&self, room_id: &RoomId, name: &str) -> DbResult<()>;
}

// ── Credential issuer ────────────────────────────────────────────

/// Issues relay credentials per room.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Returns a fresh token/url/expiry triple for the room.
    async fn issue(&self, room_id: &RoomId) -> DbResult<RelayToken>;
}

/// The full provider set a database instance runs against.
pub struct ProviderSet {
    pub local: Arc<dyn LocalProviderFactory>,
    pub relay: Arc<dyn RelayProviderFactory>,
    pub federation: Arc<dyn Federation>,
    pub credentials: Arc<dyn CredentialIssuer>,
}

// ── Mocks ────────────────────────────────────────────────────────

/// In-memory provider implementations for testing.
pub mod mock {
    use super::*;
    use chrono::{Duration, Utc};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory mapped container with last-write-wins entries.
    #[derive(Default)]
    pub struct MockMap {
        entries: Mutex<HashMap<String, Value>>,
    }

    impl DocMap for MockMap {
        fn get(&self, key: &str) -> Option<Value> {
            self.entries.lock().unwrap().get(key).cloned()
        }

        fn set(&self, key: &str, value: Value) {
            self.entries.lock().unwrap().insert(key.to_string(), value);
        }

        fn remove(&self, key: &str) -> Option<Value> {
            self.entries.lock().unwrap().remove(key)
        }

        fn clear(&self) {
            self.entries.lock().unwrap().clear();
        }

        fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }

        fn keys(&self) -> Vec<String> {
            self.entries.lock().unwrap().keys().cloned().collect()
        }
    }

    /// In-memory shared document.
    #[derive(Default)]
    pub struct MockDoc {
        maps: Mutex<HashMap<String, Arc<MockMap>>>,
    }

    impl MockDoc {
        #[must_use]
        pub fn new() -> DocHandle {
            Arc::new(Self::default())
        }
    }

    impl SharedDoc for MockDoc {
        fn map(&self, name: &str) -> Arc<dyn DocMap> {
            let mut maps = self.maps.lock().unwrap();
            maps.entry(name.to_string())
                .or_insert_with(|| Arc::new(MockMap::default()))
                .clone()
        }
    }

    /// Mock local provider handle.
    pub struct MockLocalProvider {
        storage_key: String,
        pub detached: AtomicBool,
    }

    #[async_trait]
    impl LocalProvider for MockLocalProvider {
        fn storage_key(&self) -> &str {
            &self.storage_key
        }

        async fn detach(&self) -> DbResult<()> {
            self.detached.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Mock local provider factory. Counts attachments so tests can
    /// assert idempotency, and can be told to fail.
    #[derive(Default)]
    pub struct MockLocalFactory {
        pub attach_count: AtomicUsize,
        pub fail: AtomicBool,
        providers: Mutex<Vec<Arc<MockLocalProvider>>>,
    }

    impl MockLocalFactory {
        #[must_use]
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn fail_next(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn attachments(&self) -> usize {
            self.attach_count.load(Ordering::SeqCst)
        }

        /// The most recently attached provider.
        pub fn last_provider(&self) -> Option<Arc<MockLocalProvider>> {
            self.providers.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl LocalProviderFactory for MockLocalFactory {
        async fn attach(
            &self,
            storage_key: &str,
            doc: Option<DocHandle>,
        ) -> DbResult<(DocHandle, Arc<dyn LocalProvider>)> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DbError::LocalStorage(format!(
                    "mock attach failure for {storage_key}"
                )));
            }
            self.attach_count.fetch_add(1, Ordering::SeqCst);
            let doc = doc.unwrap_or_else(MockDoc::new);
            let provider = Arc::new(MockLocalProvider {
                storage_key: storage_key.to_string(),
                detached: AtomicBool::new(false),
            });
            self.providers.lock().unwrap().push(provider.clone());
            Ok((doc, provider))
        }
    }

    /// Mock relay connection. Events pushed via [`MockRelay::emit`] (or
    /// scripted on the factory) reach every subscriber.
    pub struct MockRelay {
        token: String,
        subscribers: Mutex<Vec<mpsc::UnboundedSender<RelayEvent>>>,
        /// Events delivered to each new subscriber on subscribe.
        pending: Mutex<Vec<RelayEvent>>,
        pub disconnected: AtomicBool,
    }

    impl MockRelay {
        pub fn emit(&self, event: RelayEvent) {
            let subscribers = self.subscribers.lock().unwrap();
            if subscribers.is_empty() {
                drop(subscribers);
                self.pending.lock().unwrap().push(event);
                return;
            }
            for tx in subscribers.iter() {
                let _ = tx.send(event.clone());
            }
        }
    }

    #[async_trait]
    impl RelayProvider for MockRelay {
        fn token(&self) -> &str {
            &self.token
        }

        fn subscribe(&self) -> mpsc::UnboundedReceiver<RelayEvent> {
            let (tx, rx) = mpsc::unbounded_channel();
            for event in self.pending.lock().unwrap().drain(..) {
                let _ = tx.send(event);
            }
            self.subscribers.lock().unwrap().push(tx);
            rx
        }

        async fn disconnect(&self) -> DbResult<()> {
            self.disconnected.store(true, Ordering::SeqCst);
            // Dropping the senders closes subscriber streams.
            self.subscribers.lock().unwrap().clear();
            Ok(())
        }
    }

    /// Mock relay factory. Each `connect` pops the next script entry —
    /// the events the new connection emits up front — defaulting to a
    /// clean `Sync(true)` connection when the script is empty.
    #[derive(Default)]
    pub struct MockRelayFactory {
        pub connect_count: AtomicUsize,
        script: Mutex<VecDeque<Vec<RelayEvent>>>,
        connections: Mutex<Vec<Arc<MockRelay>>>,
    }

    impl MockRelayFactory {
        #[must_use]
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Queues the event script for the next connection.
        pub fn script_next(&self, events: Vec<RelayEvent>) {
            self.script.lock().unwrap().push_back(events);
        }

        pub fn connects(&self) -> usize {
            self.connect_count.load(Ordering::SeqCst)
        }

        /// The most recently opened connection.
        pub fn last_connection(&self) -> Option<Arc<MockRelay>> {
            self.connections.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl RelayProviderFactory for MockRelayFactory {
        async fn connect(
            &self,
            _url: &str,
            token: &str,
            _doc_id: &RoomId,
            _doc: DocHandle,
        ) -> DbResult<Arc<dyn RelayProvider>> {
            self.connect_count.fetch_add(1, Ordering::SeqCst);
            let script = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| vec![RelayEvent::Sync(true)]);
            let relay = Arc::new(MockRelay {
                token: token.to_string(),
                subscribers: Mutex::new(Vec::new()),
                pending: Mutex::new(script),
                disconnected: AtomicBool::new(false),
            });
            self.connections.lock().unwrap().push(relay.clone());
            Ok(relay)
        }
    }

    /// Mock federated room server with in-memory accounts and rooms.
    #[derive(Default)]
    pub struct MockFederation {
        accounts: Mutex<HashMap<String, String>>,
        rooms: Mutex<HashMap<String, (RoomId, String)>>,
    }

    impl MockFederation {
        #[must_use]
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Pre-registers an account.
        pub fn seed_account(&self, username: &str, password: &str) {
            self.accounts
                .lock()
                .unwrap()
                .insert(username.to_string(), password.to_string());
        }

        pub fn room_count(&self) -> usize {
            self.rooms.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Federation for MockFederation {
        async fn login(&self, user_id: &UserId, password: &str) -> DbResult<String> {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(user_id.local_part()) {
                Some(stored) if stored == password => {
                    Ok(format!("mock-access-token-{}", user_id.local_part()))
                }
                _ => Err(DbError::AuthenticationFailed(format!(
                    "bad credentials for {user_id}"
                ))),
            }
        }

        async fn register(&self, username: &str, password: &str) -> DbResult<()> {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(username) {
                return Err(DbError::UserAlreadyExists(username.to_string()));
            }
            accounts.insert(username.to_string(), password.to_string());
            Ok(())
        }

        async fn resolve_alias(&self, alias: &RoomAlias) -> DbResult<Option<RoomId>> {
            Ok(self
                .rooms
                .lock()
                .unwrap()
                .get(&alias.to_string())
                .map(|(id, _)| *id))
        }

        async fn create_room(&self, alias: &RoomAlias, name: &str) -> DbResult<RoomId> {
            let mut rooms = self.rooms.lock().unwrap();
            let entry = rooms
                .entry(alias.to_string())
                .or_insert_with(|| (RoomId::new(), name.to_string()));
            Ok(entry.0)
        }

        async fn room_name(&self, room_id: &RoomId) -> DbResult<Option<String>> {
            Ok(self
                .rooms
                .lock()
                .unwrap()
                .values()
                .find(|(id, _)| id == room_id)
                .map(|(_, name)| name.clone()))
        }

        async fn set_room_name(&self, room_id: &RoomId, name: &str) -> DbResult<()> {
            let mut rooms = self.rooms.lock().unwrap();
            for (id, stored) in rooms.values_mut() {
                if id == room_id {
                    *stored = name.to_string();
                    return Ok(());
                }
            }
            Err(DbError::RoomNotFound(room_id.to_string()))
        }
    }

    /// Mock credential issuer with monotonically numbered tokens.
    #[derive(Default)]
    pub struct MockIssuer {
        pub issue_count: AtomicUsize,
        pub fail: AtomicBool,
    }

    impl MockIssuer {
        #[must_use]
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn fail_next(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn issued(&self) -> usize {
            self.issue_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialIssuer for MockIssuer {
        async fn issue(&self, room_id: &RoomId) -> DbResult<RelayToken> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DbError::RelayConnection(
                    "mock credential issuer failure".into(),
                ));
            }
            let n = self.issue_count.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(RelayToken::new(
                format!("mock-token-{n}"),
                format!("wss://relay.mock/{room_id}"),
                Some(Utc::now() + Duration::hours(1)),
            ))
        }
    }

    /// A full mock provider set plus handles to each mock for test
    /// orchestration.
    pub struct MockProviders {
        pub local: Arc<MockLocalFactory>,
        pub relay: Arc<MockRelayFactory>,
        pub federation: Arc<MockFederation>,
        pub credentials: Arc<MockIssuer>,
    }

    impl MockProviders {
        #[must_use]
        pub fn new() -> Self {
            Self {
                local: MockLocalFactory::new(),
                relay: MockRelayFactory::new(),
                federation: MockFederation::new(),
                credentials: MockIssuer::new(),
            }
        }

        #[must_use]
        pub fn provider_set(&self) -> ProviderSet {
            ProviderSet {
                local: self.local.clone(),
                relay: self.relay.clone(),
                federation: self.federation.clone(),
                credentials: self.credentials.clone(),
            }
        }
    }

    impl Default for MockProviders {
        fn default() -> Self {
            Self::new()
        }
    }
}
