//! Typed event bus.
//!
//! Every component reports its state transitions through one of these
//! buses: each room carries its own, and the database carries the
//! top-level one that room buses forward into. Listeners run
//! synchronously, in registration order; one listener failing never
//! prevents the rest from running.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Severity of an emitted event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    #[default]
    Info,
    Warn,
    Error,
}

/// One observable state transition.
///
/// Transient: events are fanned out at emission time and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbEvent {
    /// Event name, e.g. `roomLoaded` or `populateRegistry`.
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub level: EventLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl DbEvent {
    /// Creates an event with the default `Info` level.
    #[must_use]
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            message: None,
            level: EventLevel::Info,
            data: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: EventLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Error returned by a failing listener.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Listener = Arc<dyn Fn(&DbEvent) -> Result<(), ListenerError> + Send + Sync>;

/// Stable handle for deregistering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Process-wide publish/subscribe registry.
///
/// `emit` invokes every currently-registered listener synchronously in
/// registration order. Listener errors are collected rather than
/// short-circuiting; use [`EventBus::emit_collected`] to observe them.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fallible listener and returns its handle.
    pub fn on<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&DbEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap()
            .push((id, Arc::new(listener)));
        ListenerHandle(id)
    }

    /// Registers an infallible listener.
    pub fn on_event<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&DbEvent) + Send + Sync + 'static,
    {
        self.on(move |event| {
            listener(event);
            Ok(())
        })
    }

    /// Deregisters a listener. Returns whether the handle was known.
    pub fn off(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != handle.0);
        listeners.len() != before
    }

    /// Emits an event, discarding listener errors.
    pub fn emit(&self, event: &DbEvent) {
        let _ = self.emit_collected(event);
    }

    /// Emits an event and returns the errors of every listener that
    /// failed, paired with its handle. All listeners run regardless.
    pub fn emit_collected(&self, event: &DbEvent) -> Vec<(ListenerHandle, ListenerError)> {
        // Snapshot under the lock so listeners may register/deregister
        // reentrantly without deadlocking.
        let snapshot: Vec<(u64, Listener)> = self.listeners.lock().unwrap().clone();
        let mut failures = Vec::new();
        for (id, listener) in snapshot {
            if let Err(err) = listener(event) {
                failures.push((ListenerHandle(id), err));
            }
        }
        failures
    }

    /// Number of currently-registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
