//! Real-time delivery configuration.

use serde::{Deserialize, Serialize};

/// What happens when a connection's outbound queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the oldest queued frame to make room.
    DropOldest,
    /// Close the slow connection.
    Disconnect,
}

/// Real-time (WebSocket) delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each connection's outbound queue.
    #[serde(default = "default_buffer")]
    pub outbound_buffer_size: usize,
    /// Overflow behaviour for full outbound queues.
    #[serde(default = "default_policy")]
    pub overflow_policy: OverflowPolicy,
    /// Maximum inbound frame size in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Content prefix that marks a command.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_buffer_size: default_buffer(),
            overflow_policy: default_policy(),
            max_message_bytes: default_max_message_bytes(),
            command_prefix: default_command_prefix(),
        }
    }
}

fn default_buffer() -> usize {
    256
}

fn default_policy() -> OverflowPolicy {
    OverflowPolicy::DropOldest
}

fn default_max_message_bytes() -> usize {
    65_536
}

fn default_command_prefix() -> String {
    "/".to_string()
}
