//! Connection Registry
//!
//! Maps a `websocketId` to the single live connection of that application.
//! The in-process implementation only holds within one server instance;
//! running several instances needs a shared backplane behind this trait.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use super::messages::ServerFrame;

/// One live gateway connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub connection_id: Uuid,
    pub websocket_id: Uuid,
    pub application_id: Uuid,
    scopes: RwLock<Vec<String>>,
    subscriptions: RwLock<HashSet<String>>,
    sender: mpsc::UnboundedSender<ServerFrame>,
    evicted: Notify,
}

impl ConnectionHandle {
    pub fn new(
        websocket_id: Uuid,
        application_id: Uuid,
        scopes: Vec<String>,
        sender: mpsc::UnboundedSender<ServerFrame>,
    ) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            websocket_id,
            application_id,
            scopes: RwLock::new(scopes),
            subscriptions: RwLock::new(HashSet::new()),
            sender,
            evicted: Notify::new(),
        }
    }

    /// Queue a frame. Returns false once the socket has gone away.
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.sender.send(frame).is_ok()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.read().iter().any(|s| s == scope)
    }

    /// Replace the granted scopes, dropping subscriptions they no longer
    /// cover. `allowed` maps an event to whether it is still receivable.
    /// Returns the dropped events, sorted.
    pub fn restrict(&self, scopes: Vec<String>, allowed: impl Fn(&str) -> bool) -> Vec<String> {
        *self.scopes.write() = scopes;
        let mut subscriptions = self.subscriptions.write();
        let mut dropped: Vec<String> = subscriptions
            .iter()
            .filter(|event| !allowed(event.as_str()))
            .cloned()
            .collect();
        for event in &dropped {
            subscriptions.remove(event);
        }
        dropped.sort();
        dropped
    }

    pub fn subscribe(&self, events: &[String]) {
        self.subscriptions.write().extend(events.iter().cloned());
    }

    /// Remove `events`, returning the ones that were subscribed.
    pub fn unsubscribe(&self, events: &[String]) -> Vec<String> {
        let mut subscriptions = self.subscriptions.write();
        events
            .iter()
            .filter(|event| subscriptions.remove(event.as_str()))
            .cloned()
            .collect()
    }

    pub fn is_subscribed(&self, event: &str) -> bool {
        self.subscriptions.read().contains(event)
    }

    /// Current subscriptions, sorted.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut events: Vec<String> = self.subscriptions.read().iter().cloned().collect();
        events.sort();
        events
    }

    /// Send a final frame and signal the connection task to close.
    pub fn evict(&self, frame: ServerFrame) {
        let _ = self.sender.send(frame);
        self.evicted.notify_one();
    }

    /// Resolves once `evict` has been called.
    pub async fn evicted(&self) {
        self.evicted.notified().await
    }
}

/// Storage for live connections, keyed by `websocketId`.
pub trait ConnectionRegistry: Send + Sync {
    /// Store `handle`, returning the connection it replaced. The swap is
    /// atomic with respect to concurrent registrations of the same id.
    fn register(&self, handle: Arc<ConnectionHandle>) -> Option<Arc<ConnectionHandle>>;

    /// Remove the mapping only if it still points at `connection_id`.
    fn unregister(&self, websocket_id: Uuid, connection_id: Uuid) -> bool;

    fn get(&self, websocket_id: Uuid) -> Option<Arc<ConnectionHandle>>;

    fn connections(&self) -> Vec<Arc<ConnectionHandle>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `DashMap`-backed registry for a single server process.
#[derive(Debug, Default)]
pub struct InMemoryConnectionRegistry {
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConnectionRegistry for InMemoryConnectionRegistry {
    fn register(&self, handle: Arc<ConnectionHandle>) -> Option<Arc<ConnectionHandle>> {
        self.connections.insert(handle.websocket_id, handle)
    }

    fn unregister(&self, websocket_id: Uuid, connection_id: Uuid) -> bool {
        self.connections
            .remove_if(&websocket_id, |_, handle| handle.connection_id == connection_id)
            .is_some()
    }

    fn get(&self, websocket_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&websocket_id).map(|entry| entry.value().clone())
    }

    fn connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|entry| entry.value().clone()).collect()
    }

    fn len(&self) -> usize {
        self.connections.len()
    }
}
