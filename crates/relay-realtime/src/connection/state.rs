//! Connection lifecycle state machine and close codes.

use std::fmt;

use serde::Serialize;

/// Close codes sent to clients when the server ends a connection.
pub mod close_code {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// Server shutting down.
    pub const GOING_AWAY: u16 = 1001;
    /// Authentication failed.
    pub const POLICY_VIOLATION: u16 = 1008;
    /// Outbound queue overflowed under the `disconnect` policy.
    pub const TRY_AGAIN_LATER: u16 = 1013;
    /// Evicted by the per-user connection cap.
    pub const TOO_MANY_DEVICES: u16 = 4000;
    /// Force-disconnected by an admin or plugin.
    pub const KICKED: u16 = 4001;
    /// Silent past the heartbeat timeout.
    pub const HEARTBEAT_TIMEOUT: u16 = 4002;
    /// Rejected by a connect hook.
    pub const REJECTED: u16 = 4003;
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// Transport accepted, not yet registered.
    Connecting,
    /// Registered, waiting for a credential.
    Authenticating,
    /// Credential accepted.
    Authenticated,
    /// Recent traffic.
    Active,
    /// Silent past the idle threshold.
    Idle,
    /// Teardown started.
    Disconnecting,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if the transition is allowed.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Disconnecting, _) => false,
            (_, Disconnecting) => true,
            (Connecting, Authenticating) => true,
            (Authenticating, Authenticated) => true,
            (Authenticated, Active) => true,
            (Active, Idle) | (Idle, Active) => true,
            _ => false,
        }
    }

    /// Authenticated and not being torn down.
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::Active | Self::Idle)
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Authenticating => "AUTHENTICATING",
            Self::Authenticated => "AUTHENTICATED",
            Self::Active => "ACTIVE",
            Self::Idle => "IDLE",
            Self::Disconnecting => "DISCONNECTING",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refused state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid connection state transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// State before the attempt.
    pub from: ConnectionState,
    /// Requested state.
    pub to: ConnectionState,
}
