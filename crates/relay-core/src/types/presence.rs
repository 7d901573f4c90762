//! Read-only snapshots of connections and sessions.
//!
//! These are what hooks, admin endpoints, and plugins observe; the live
//! records stay inside the realtime crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ConnectionId, UserId};
use super::role::Role;

/// Presence status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    /// At least one connection has recent traffic.
    Online,
    /// Every connection has been silent past the idle threshold.
    Idle,
}

impl SessionStatus {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Idle => "IDLE",
        }
    }
}

/// Snapshot of one connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Connection id.
    pub connection_id: ConnectionId,
    /// Authenticated user, if any yet.
    pub user_id: Option<UserId>,
    /// Role of the authenticated user.
    pub role: Option<Role>,
    /// Peer address as reported by the transport.
    pub remote_address: Option<String>,
    /// Accept time.
    pub connected_at: DateTime<Utc>,
    /// Last inbound traffic.
    pub last_activity_at: DateTime<Utc>,
}

/// Snapshot of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session owner.
    pub user_id: UserId,
    /// Display name from the first claim.
    pub display_name: String,
    /// Role from the first claim.
    pub role: Role,
    /// Attached connections, oldest first.
    pub connection_ids: Vec<ConnectionId>,
    /// Creation time.
    pub joined_at: DateTime<Utc>,
    /// Most recent traffic on any connection.
    pub last_seen_at: DateTime<Utc>,
    /// Presence status.
    pub status: SessionStatus,
}
