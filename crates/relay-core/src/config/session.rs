//! Presence and liveness configuration.

use serde::{Deserialize, Serialize};

/// Session manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// A connection silent for longer than this is evicted.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_seconds: u64,
    /// A connection silent for longer than this is marked idle.
    #[serde(default = "default_idle_after")]
    pub idle_after_seconds: u64,
    /// Interval between background sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Maximum simultaneous connections per user. The oldest is evicted
    /// when a new one would exceed the cap. `0` disables the cap.
    #[serde(default = "default_max_connections")]
    pub max_connections_per_user: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_seconds: default_heartbeat_timeout(),
            idle_after_seconds: default_idle_after(),
            sweep_interval_seconds: default_sweep_interval(),
            max_connections_per_user: default_max_connections(),
        }
    }
}

fn default_heartbeat_timeout() -> u64 {
    30
}

fn default_idle_after() -> u64 {
    15
}

fn default_sweep_interval() -> u64 {
    5
}

fn default_max_connections() -> usize {
    3
}
