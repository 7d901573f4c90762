//! Plugin context — services and resources available to plugin handlers.

use std::sync::Arc;

use relay_core::types::{SessionInfo, UserId};

use crate::commands::CommandProcessor;

/// Context handed to plugins at activation.
///
/// Plugins keep clones of the parts they need inside their handlers.
#[derive(Clone)]
pub struct PluginContext {
    /// Presence control.
    pub sessions: Arc<dyn SessionControl>,
    /// Command registry, for help listings.
    pub commands: Arc<CommandProcessor>,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext").finish()
    }
}

/// Presence operations available to plugins.
#[async_trait::async_trait]
pub trait SessionControl: Send + Sync {
    /// Closes every connection of a user. Returns how many were closed.
    async fn force_disconnect(&self, user_id: &UserId, reason: &str) -> usize;

    /// Snapshot of all present users.
    async fn list_online(&self) -> Vec<SessionInfo>;

    /// Sends a SYSTEM notice to one user. Returns the number of connections reached.
    async fn notify(&self, user_id: &UserId, content: &str) -> usize;
}
