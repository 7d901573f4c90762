//! Relay engine metrics.

pub mod connections;
pub mod messages;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Connections ever accepted
    pub connections_accepted: AtomicU64,
    /// Connections currently registered
    pub connections_active: AtomicU64,
    /// Inbound frames received
    pub messages_received: AtomicU64,
    /// Deliveries queued to recipients
    pub messages_routed: AtomicU64,
    /// Frames discarded by a full outbound queue
    pub messages_dropped: AtomicU64,
    /// Rejected credentials
    pub auth_failures: AtomicU64,
    /// Commands claimed by a handler
    pub commands_executed: AtomicU64,
}

impl EngineMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of all metrics. Hook faults are counted by the plugin
    /// fault tracker and passed in.
    pub fn snapshot(&self, hook_faults: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_routed: self.messages_routed.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            hook_faults,
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Connections ever accepted
    pub connections_accepted: u64,
    /// Connections currently registered
    pub connections_active: u64,
    /// Inbound frames received
    pub messages_received: u64,
    /// Deliveries queued to recipients
    pub messages_routed: u64,
    /// Frames discarded by a full outbound queue
    pub messages_dropped: u64,
    /// Rejected credentials
    pub auth_failures: u64,
    /// Plugin faults in hooks and commands
    pub hook_faults: u64,
    /// Commands claimed by a handler
    pub commands_executed: u64,
}
