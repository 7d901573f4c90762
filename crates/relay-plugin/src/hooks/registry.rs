//! Hook registry — plugins register handlers per phase, kept in registration order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::HookError;

use super::definitions::{HookAction, HookContext, HookPhase};

/// A hook callback.
///
/// Handlers receive the context produced by the previous handler and
/// return an action; they never mutate the context they are given.
#[async_trait]
pub trait HookHandler: Send + Sync + std::fmt::Debug {
    /// Handles one dispatch.
    async fn handle(&self, ctx: &HookContext) -> Result<HookAction, HookError>;
}

/// Entry in the hook registry.
#[derive(Debug, Clone)]
pub(crate) struct HookEntry {
    /// The handler.
    pub(crate) handler: Arc<dyn HookHandler>,
    /// Plugin that registered this handler.
    pub(crate) plugin: String,
}

/// Registry of hook handlers organized by phase.
#[derive(Debug, Default)]
pub struct HookRegistry {
    /// Phase → handlers in registration order.
    handlers: RwLock<HashMap<HookPhase, Vec<HookEntry>>>,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler for a phase.
    pub async fn register(&self, phase: HookPhase, plugin: &str, handler: Arc<dyn HookHandler>) {
        let mut handlers = self.handlers.write().await;
        let entries = handlers.entry(phase).or_default();
        entries.push(HookEntry {
            handler,
            plugin: plugin.to_string(),
        });

        info!(
            phase = %phase,
            plugin = %plugin,
            position = entries.len(),
            "Hook handler registered"
        );
    }

    /// Removes all handlers of a plugin. Returns how many were removed.
    pub async fn unregister_plugin(&self, plugin: &str) -> usize {
        let mut handlers = self.handlers.write().await;
        let mut removed = 0;

        for entries in handlers.values_mut() {
            let before = entries.len();
            entries.retain(|e| e.plugin != plugin);
            removed += before - entries.len();
        }
        handlers.retain(|_, entries| !entries.is_empty());

        if removed > 0 {
            info!(plugin = %plugin, removed, "Hook handlers unregistered");
        }
        removed
    }

    /// Snapshot of a phase's handlers. The lock is released before return.
    pub(crate) async fn snapshot(&self, phase: HookPhase) -> Vec<HookEntry> {
        let handlers = self.handlers.read().await;
        handlers.get(&phase).cloned().unwrap_or_default()
    }

    /// Number of handlers registered for a phase.
    pub async fn handler_count(&self, phase: HookPhase) -> usize {
        let handlers = self.handlers.read().await;
        handlers.get(&phase).map(Vec::len).unwrap_or(0)
    }

    /// Number of handlers a plugin has registered across all phases.
    pub async fn plugin_handler_count(&self, plugin: &str) -> usize {
        let handlers = self.handlers.read().await;
        handlers
            .values()
            .flat_map(|entries| entries.iter())
            .filter(|e| e.plugin == plugin)
            .count()
    }
}
