//! Per-plugin fault accounting.
//!
//! Every error, panic, or timeout raised by a plugin's hook or command is
//! a fault. Once a plugin accumulates `threshold` faults, all of its
//! registrations are skipped until it is resumed or reloaded. A threshold
//! of `0` disables suspension.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// What went wrong inside a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginFault {
    /// The callback returned an error.
    Error(String),
    /// The callback panicked.
    Panic(String),
    /// The callback exceeded the configured time limit.
    Timeout,
    /// The callback substituted a payload the core does not accept.
    InvalidSubstitution(String),
}

impl fmt::Display for PluginFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(msg) => write!(f, "error: {msg}"),
            Self::Panic(msg) => write!(f, "panic: {msg}"),
            Self::Timeout => write!(f, "timed out"),
            Self::InvalidSubstitution(msg) => write!(f, "invalid substitution: {msg}"),
        }
    }
}

impl PluginFault {
    /// Builds a `Panic` fault from a caught panic payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panic(message)
    }
}

/// Fault counters and the suspended set, shared by the hook pipeline and
/// the command processor.
#[derive(Debug)]
pub struct FaultTracker {
    threshold: u32,
    counts: DashMap<String, u32>,
    suspended: DashMap<String, DateTime<Utc>>,
    total: AtomicU64,
}

impl FaultTracker {
    /// Creates a tracker that suspends after `threshold` faults.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            counts: DashMap::new(),
            suspended: DashMap::new(),
            total: AtomicU64::new(0),
        }
    }

    /// Records a fault. Returns `true` if this fault suspended the plugin.
    pub fn record(&self, plugin: &str, fault: &PluginFault) -> bool {
        let count = {
            let mut entry = self.counts.entry(plugin.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.total.fetch_add(1, Ordering::Relaxed);

        tracing::error!(
            event = "hook_fault",
            plugin = %plugin,
            fault = %fault,
            fault_count = count,
            "Plugin fault isolated"
        );

        if self.threshold > 0 && count >= self.threshold && !self.is_suspended(plugin) {
            self.suspended.insert(plugin.to_string(), Utc::now());
            tracing::warn!(
                plugin = %plugin,
                fault_count = count,
                "Plugin suspended after repeated faults"
            );
            return true;
        }
        false
    }

    /// Returns `true` if the plugin's registrations are currently skipped.
    pub fn is_suspended(&self, plugin: &str) -> bool {
        self.suspended.contains_key(plugin)
    }

    /// Faults recorded for a plugin since it was last reset.
    pub fn fault_count(&self, plugin: &str) -> u32 {
        self.counts.get(plugin).map(|c| *c).unwrap_or(0)
    }

    /// Clears counters and lifts any suspension.
    pub fn reset(&self, plugin: &str) {
        self.counts.remove(plugin);
        if self.suspended.remove(plugin).is_some() {
            tracing::info!(plugin = %plugin, "Plugin resumed");
        }
    }

    /// Faults recorded across all plugins since startup.
    pub fn total_faults(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Names of all suspended plugins.
    pub fn suspended_plugins(&self) -> Vec<String> {
        self.suspended.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspends_at_threshold() {
        let tracker = FaultTracker::new(2);
        assert!(!tracker.record("noisy", &PluginFault::Timeout));
        assert!(!tracker.is_suspended("noisy"));
        assert!(tracker.record("noisy", &PluginFault::Error("boom".into())));
        assert!(tracker.is_suspended("noisy"));
        // Already suspended: no second transition.
        assert!(!tracker.record("noisy", &PluginFault::Timeout));
        assert_eq!(tracker.fault_count("noisy"), 3);

        tracker.reset("noisy");
        assert!(!tracker.is_suspended("noisy"));
        assert_eq!(tracker.fault_count("noisy"), 0);
    }

    #[test]
    fn test_zero_threshold_never_suspends() {
        let tracker = FaultTracker::new(0);
        for _ in 0..10 {
            tracker.record("p", &PluginFault::Timeout);
        }
        assert!(!tracker.is_suspended("p"));
    }

    #[test]
    fn test_panic_payload_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("exploded");
        assert_eq!(
            PluginFault::from_panic(payload),
            PluginFault::Panic("exploded".to_string())
        );
    }
}
