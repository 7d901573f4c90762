//! Plugin framework configuration.

use serde::{Deserialize, Serialize};

/// Hook pipeline and plugin manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Faults tolerated from one plugin before its registrations are suspended.
    #[serde(default = "default_fault_threshold")]
    pub fault_threshold: u32,
    /// Upper bound on a single hook or command invocation.
    #[serde(default = "default_hook_timeout")]
    pub hook_timeout_ms: u64,
    /// Whether the built-in command plugin is loaded at startup.
    #[serde(default = "default_true")]
    pub builtin_enabled: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            fault_threshold: default_fault_threshold(),
            hook_timeout_ms: default_hook_timeout(),
            builtin_enabled: true,
        }
    }
}

fn default_fault_threshold() -> u32 {
    3
}

fn default_hook_timeout() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}
