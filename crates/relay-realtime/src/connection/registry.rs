//! Connection registry — every live transport, indexed by id and by user.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, warn};

use relay_core::protocol::Message;
use relay_core::types::{Claim, ConnectionId, UserId};

use crate::metrics::{EngineMetrics, connections, messages};

use super::handle::ConnectionHandle;
use super::queue::PushOutcome;
use super::state::close_code;

/// Thread-safe registry of all live connections.
///
/// Fan-out operations snapshot the matching handles first and serialize
/// the message once; no map shard is held while frames are queued.
#[derive(Debug)]
pub struct ConnectionRegistry {
    /// Connection ID → handle.
    by_id: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    /// User ID → connection IDs in attach order.
    by_user: DashMap<UserId, Vec<ConnectionId>>,
    metrics: Arc<EngineMetrics>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new(metrics: Arc<EngineMetrics>) -> Self {
        Self {
            by_id: DashMap::new(),
            by_user: DashMap::new(),
            metrics,
        }
    }

    /// Adds a connection.
    pub fn register(&self, handle: Arc<ConnectionHandle>) -> ConnectionId {
        let id = handle.id();
        if let Some(claim) = handle.identity() {
            self.by_user.entry(claim.user_id).or_default().push(id);
        }
        self.by_id.insert(id, handle);
        connections::record_connect(&self.metrics);
        id
    }

    /// Gets a connection by id.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.get(id).map(|entry| entry.value().clone())
    }

    /// Records the claim on a registered connection and indexes it by user.
    /// Returns `false` if the connection is no longer registered.
    pub fn attach_identity(&self, id: &ConnectionId, claim: Claim) -> bool {
        let Some(handle) = self.get(id) else {
            return false;
        };
        let user_id = claim.user_id.clone();
        handle.set_identity(claim);

        let mut ids = self.by_user.entry(user_id).or_default();
        if !ids.contains(id) {
            ids.push(*id);
        }
        drop(ids);

        // Lost a race with deregister: undo the user index entry.
        if !self.by_id.contains_key(id) {
            self.unindex(&handle);
            return false;
        }
        true
    }

    /// Removes a connection. Only the first caller receives the handle.
    pub fn deregister(&self, id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.by_id.remove(id)?;
        self.unindex(&handle);
        connections::record_disconnect(&self.metrics);
        debug!(conn_id = %id, "Connection deregistered");
        Some(handle)
    }

    fn unindex(&self, handle: &ConnectionHandle) {
        let Some(user_id) = handle.user_id() else {
            return;
        };
        if let Some(mut ids) = self.by_user.get_mut(&user_id) {
            ids.retain(|c| *c != handle.id());
        }
        self.by_user.remove_if(&user_id, |_, ids| ids.is_empty());
    }

    /// Delivers to every connection accepted by `predicate`. Returns the
    /// number of connections the message was queued for.
    pub fn broadcast<F>(&self, message: &Message, predicate: F) -> usize
    where
        F: Fn(&ConnectionHandle) -> bool,
    {
        let targets: Vec<_> = self
            .by_id
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        self.fan_out(message, &targets)
    }

    /// Delivers to every authenticated connection.
    pub fn broadcast_authenticated(&self, message: &Message) -> usize {
        self.broadcast(message, ConnectionHandle::is_authenticated)
    }

    /// Delivers to every connection of `user_id`.
    pub fn unicast(&self, message: &Message, user_id: &UserId) -> usize {
        let targets = self.connections_for(user_id);
        self.fan_out(message, &targets)
    }

    /// Delivers to a single connection.
    pub fn send_to(&self, handle: &ConnectionHandle, message: &Message) -> bool {
        match message.to_json() {
            Ok(text) => self.deliver(handle, Arc::from(text)),
            Err(e) => {
                error!(error = %e, "Failed to serialize outbound message");
                false
            }
        }
    }

    fn fan_out(&self, message: &Message, targets: &[Arc<ConnectionHandle>]) -> usize {
        if targets.is_empty() {
            return 0;
        }
        let text: Arc<str> = match message.to_json() {
            Ok(text) => Arc::from(text),
            Err(e) => {
                error!(error = %e, "Failed to serialize outbound message");
                return 0;
            }
        };

        let delivered = targets
            .iter()
            .filter(|handle| self.deliver(handle, text.clone()))
            .count();
        messages::record_routed(&self.metrics, delivered);
        delivered
    }

    fn deliver(&self, handle: &ConnectionHandle, text: Arc<str>) -> bool {
        match handle.send(text) {
            PushOutcome::Queued => true,
            PushOutcome::DroppedOldest => {
                messages::record_dropped(&self.metrics);
                debug!(conn_id = %handle.id(), "Outbound queue full, dropped oldest frame");
                true
            }
            PushOutcome::Overflow => {
                messages::record_dropped(&self.metrics);
                warn!(conn_id = %handle.id(), "Outbound queue overflow, closing connection");
                handle.close(close_code::TRY_AGAIN_LATER, "Outbound queue overflow");
                false
            }
            PushOutcome::Closed => false,
        }
    }

    /// Connections of a user, oldest first.
    pub fn connections_for(&self, user_id: &UserId) -> Vec<Arc<ConnectionHandle>> {
        let ids = self
            .by_user
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// All registered connections.
    pub fn all(&self) -> Vec<Arc<ConnectionHandle>> {
        self.by_id
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of registered connections.
    pub fn count(&self) -> usize {
        self.by_id.len()
    }

    /// Number of users with at least one authenticated connection.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}
