//! Session manager — one logical presence per authenticated user.
//!
//! The session table sits behind a single mutex that is never held across
//! an `.await`. JOIN and LEAVE are queued to observers while the lock is
//! still held, so every observer sees a user's presence events in the same
//! order the table changed. Lock order is always table, then outbound
//! queue; queueing never blocks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use relay_core::config::SessionConfig;
use relay_core::protocol::Message;
use relay_core::types::{Claim, ConnectionId, SessionInfo, SessionStatus, UserId};
use relay_plugin::api::SessionControl;

use crate::connection::{ConnectionHandle, ConnectionRegistry, ConnectionState, close_code};

#[derive(Debug, Clone)]
struct SessionEntry {
    display_name: String,
    role: relay_core::types::Role,
    connection_ids: Vec<ConnectionId>,
    joined_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    status: SessionStatus,
}

impl SessionEntry {
    fn info(&self, user_id: &UserId) -> SessionInfo {
        SessionInfo {
            user_id: user_id.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            connection_ids: self.connection_ids.clone(),
            joined_at: self.joined_at,
            last_seen_at: self.last_seen_at,
            status: self.status,
        }
    }
}

#[derive(Debug, Default)]
struct SessionTable {
    by_user: HashMap<UserId, SessionEntry>,
    by_conn: HashMap<ConnectionId, UserId>,
}

/// What `on_connect` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOutcome {
    /// A new session was created and JOIN broadcast.
    pub created: bool,
    /// Older connections detached by the per-user cap. The caller closes them.
    pub evicted: Vec<ConnectionId>,
}

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections moved to idle.
    pub idled: usize,
    /// Connections evicted for silence.
    pub evicted: usize,
}

/// Tracks presence per user across that user's connections.
#[derive(Debug)]
pub struct SessionManager {
    table: Mutex<SessionTable>,
    registry: Arc<ConnectionRegistry>,
    config: SessionConfig,
}

impl SessionManager {
    /// Creates a manager over the given registry.
    pub fn new(registry: Arc<ConnectionRegistry>, config: SessionConfig) -> Self {
        Self {
            table: Mutex::new(SessionTable::default()),
            registry,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionTable> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attaches an authenticated connection to its user's session.
    ///
    /// Creates the session and broadcasts JOIN to every other user if the
    /// user had none. When the user exceeds the connection cap, the oldest
    /// connections are detached and returned in `evicted`; the session
    /// survives, so no LEAVE is sent for them.
    pub fn on_connect(&self, claim: &Claim, connection_id: ConnectionId) -> ConnectOutcome {
        let now = Utc::now();
        let mut outcome = ConnectOutcome::default();
        let mut table = self.lock();
        if table.by_conn.contains_key(&connection_id) {
            return outcome;
        }

        let cap = self.config.max_connections_per_user;
        let entry = table
            .by_user
            .entry(claim.user_id.clone())
            .or_insert_with(|| {
                outcome.created = true;
                SessionEntry {
                    display_name: claim.display_name.clone(),
                    role: claim.role,
                    connection_ids: Vec::new(),
                    joined_at: now,
                    last_seen_at: now,
                    status: SessionStatus::Online,
                }
            });
        entry.connection_ids.push(connection_id);
        entry.last_seen_at = now;
        entry.status = SessionStatus::Online;
        if cap > 0 && entry.connection_ids.len() > cap {
            let excess = entry.connection_ids.len() - cap;
            outcome.evicted = entry.connection_ids.drain(..excess).collect();
        }

        table.by_conn.insert(connection_id, claim.user_id.clone());
        for evicted in &outcome.evicted {
            table.by_conn.remove(evicted);
        }

        if outcome.created {
            let joiner = &claim.user_id;
            let reached = self.registry.broadcast(&Message::join(joiner), |h| {
                h.is_authenticated() && h.user_id().as_ref() != Some(joiner)
            });
            drop(table);
            info!(user_id = %joiner, recipients = reached, "Session created");
        } else {
            drop(table);
            debug!(user_id = %claim.user_id, conn_id = %connection_id, "Connection attached to session");
        }
        outcome
    }

    /// Detaches a connection. Destroys the session and broadcasts LEAVE if
    /// it was the last one. Idempotent; returns the user whose session was
    /// destroyed.
    pub fn on_disconnect(&self, connection_id: ConnectionId) -> Option<UserId> {
        let mut table = self.lock();
        let user_id = table.by_conn.remove(&connection_id)?;
        let empty = match table.by_user.get_mut(&user_id) {
            Some(entry) => {
                entry.connection_ids.retain(|c| *c != connection_id);
                entry.connection_ids.is_empty()
            }
            None => false,
        };
        if !empty {
            return None;
        }

        table.by_user.remove(&user_id);
        let reached = self.registry.broadcast_authenticated(&Message::leave(&user_id));
        drop(table);
        info!(user_id = %user_id, recipients = reached, "Session destroyed");
        Some(user_id)
    }

    /// Refreshes liveness for a connection and marks its session online.
    pub fn on_heartbeat(&self, connection_id: ConnectionId) {
        if let Some(handle) = self.registry.get(&connection_id) {
            handle.touch();
        }
        let mut table = self.lock();
        let Some(user_id) = table.by_conn.get(&connection_id).cloned() else {
            return;
        };
        if let Some(entry) = table.by_user.get_mut(&user_id) {
            entry.last_seen_at = Utc::now();
            entry.status = SessionStatus::Online;
        }
    }

    /// Deregisters, closes, and detaches a connection. Only the first of
    /// any number of racing callers does the work; returns whether this
    /// call did.
    pub fn release(&self, handle: &ConnectionHandle, code: u16, reason: &str) -> bool {
        if self.registry.deregister(&handle.id()).is_none() {
            handle.close(code, reason);
            return false;
        }
        handle.close(code, reason);
        let session_ended = self.on_disconnect(handle.id()).is_some();

        info!(
            event = "disconnect",
            conn_id = %handle.id(),
            user_id = ?handle.user_id().map(|u| u.to_string()),
            code,
            reason = %reason,
            session_ended,
            "Connection closed"
        );
        true
    }

    /// Closes every connection of a user with code 4001. Returns how many
    /// this call closed.
    pub fn force_disconnect(&self, user_id: &UserId, reason: &str) -> usize {
        let reason = format!("Kicked: {reason}");
        let closed = self
            .registry
            .connections_for(user_id)
            .iter()
            .filter(|handle| self.release(handle, close_code::KICKED, &reason))
            .count();
        if closed > 0 {
            info!(user_id = %user_id, closed, reason = %reason, "User force-disconnected");
        }
        closed
    }

    /// Snapshot of all sessions, oldest first.
    pub fn list_online(&self) -> Vec<SessionInfo> {
        let table = self.lock();
        let mut sessions: Vec<_> = table
            .by_user
            .iter()
            .map(|(user_id, entry)| entry.info(user_id))
            .collect();
        sessions.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));
        sessions
    }

    /// Snapshot of one session.
    pub fn session(&self, user_id: &UserId) -> Option<SessionInfo> {
        self.lock().by_user.get(user_id).map(|e| e.info(user_id))
    }

    /// Returns `true` if the user has a session.
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.lock().by_user.contains_key(user_id)
    }

    /// Number of sessions.
    pub fn count(&self) -> usize {
        self.lock().by_user.len()
    }

    /// Runs one liveness pass as of `now`.
    ///
    /// Connections silent past `idle_after_seconds` go idle; a session whose
    /// connections are all idle becomes idle. Connections silent past
    /// `heartbeat_timeout_seconds` are released with code 4002.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let idle_after = Duration::seconds(secs(self.config.idle_after_seconds));
        let timeout = Duration::seconds(secs(self.config.heartbeat_timeout_seconds));
        let mut report = SweepReport::default();

        for handle in self.registry.all() {
            let silent = now - handle.last_activity();
            if silent > timeout {
                if self.release(&handle, close_code::HEARTBEAT_TIMEOUT, "Heartbeat timeout") {
                    report.evicted += 1;
                }
            } else if silent > idle_after
                && handle.state() == ConnectionState::Active
                && handle.transition(ConnectionState::Idle).is_ok()
            {
                report.idled += 1;
            }
        }

        let mut table = self.lock();
        for entry in table.by_user.values_mut() {
            let all_idle = entry.connection_ids.iter().all(|id| {
                self.registry
                    .get(id)
                    .is_none_or(|h| h.state() == ConnectionState::Idle)
            });
            if all_idle && entry.status == SessionStatus::Online {
                entry.status = SessionStatus::Idle;
            }
        }
        drop(table);

        if report.idled > 0 || report.evicted > 0 {
            debug!(idled = report.idled, evicted = report.evicted, "Session sweep");
        }
        report
    }

    /// Sweep interval from configuration.
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.sweep_interval_seconds.max(1))
    }
}

fn secs(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait::async_trait]
impl SessionControl for SessionManager {
    async fn force_disconnect(&self, user_id: &UserId, reason: &str) -> usize {
        SessionManager::force_disconnect(self, user_id, reason)
    }

    async fn list_online(&self) -> Vec<SessionInfo> {
        SessionManager::list_online(self)
    }

    async fn notify(&self, user_id: &UserId, content: &str) -> usize {
        self.registry
            .unicast(&Message::system(content, Some(user_id.clone())), user_id)
    }
}
