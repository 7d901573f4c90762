//! Ordered command registry with first-claim-wins dispatch.
//!
//! Only content starting with the configured prefix is considered. Handlers
//! are asked in registration order and the first one whose `claims`
//! returns `true` runs; later handlers never see the content, even if
//! they would also claim it. Content nobody claims is left for the
//! router to deliver as ordinary text.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use relay_core::types::{Claim, UserId};

use crate::error::CommandError;
use crate::faults::{FaultTracker, PluginFault};

use super::handler::{CommandHandler, CommandInvocation};

#[derive(Debug, Clone)]
struct CommandEntry {
    handler: Arc<dyn CommandHandler>,
    plugin: String,
}

/// Help-listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSummary {
    /// Command name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Contributing plugin.
    pub plugin: String,
}

/// Result of a claimed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Name of the handler that claimed the content.
    pub command: String,
    /// Plugin that contributed the handler.
    pub plugin: String,
    /// Reply for the issuer, if any.
    pub reply: Option<String>,
    /// Whether the handler faulted.
    pub faulted: bool,
}

/// Dispatches prefixed content to registered command handlers.
#[derive(Debug)]
pub struct CommandProcessor {
    prefix: String,
    handlers: RwLock<Vec<CommandEntry>>,
    faults: Arc<FaultTracker>,
    timeout: Duration,
}

impl CommandProcessor {
    /// Creates an empty processor.
    pub fn new(prefix: impl Into<String>, faults: Arc<FaultTracker>, timeout: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            handlers: RwLock::new(Vec::new()),
            faults,
            timeout,
        }
    }

    /// Returns `true` if the content carries the command prefix.
    pub fn is_command(&self, content: &str) -> bool {
        !self.prefix.is_empty() && content.trim_start().starts_with(&self.prefix)
    }

    /// Appends a handler on behalf of `plugin`.
    pub async fn register_command(&self, plugin: &str, handler: Arc<dyn CommandHandler>) {
        let name = handler.name().to_string();
        let mut handlers = self.handlers.write().await;
        if let Some(existing) = handlers.iter().find(|e| e.handler.name() == name) {
            // Allowed, but the earlier registration shadows this one.
            tracing::warn!(
                command = %name,
                plugin = %plugin,
                shadowed_by = %existing.plugin,
                "Command registered twice; the earlier registration wins"
            );
        }
        handlers.push(CommandEntry {
            handler,
            plugin: plugin.to_string(),
        });
        info!(command = %name, plugin = %plugin, "Command registered");
    }

    /// Removes all handlers of a plugin. Returns how many were removed.
    pub async fn unregister_plugin(&self, plugin: &str) -> usize {
        let mut handlers = self.handlers.write().await;
        let before = handlers.len();
        handlers.retain(|e| e.plugin != plugin);
        let removed = before - handlers.len();
        if removed > 0 {
            info!(plugin = %plugin, removed, "Commands unregistered");
        }
        removed
    }

    /// Commands currently available, in dispatch order.
    pub async fn list_commands(&self) -> Vec<CommandSummary> {
        let handlers = self.handlers.read().await;
        handlers
            .iter()
            .filter(|e| !self.faults.is_suspended(&e.plugin))
            .map(|e| CommandSummary {
                name: e.handler.name().to_string(),
                description: e.handler.description().to_string(),
                plugin: e.plugin.clone(),
            })
            .collect()
    }

    /// Number of registered handlers a plugin owns.
    pub async fn plugin_command_count(&self, plugin: &str) -> usize {
        let handlers = self.handlers.read().await;
        handlers.iter().filter(|e| e.plugin == plugin).count()
    }

    /// Offers the content to each handler in order. Returns `None` when the
    /// content is not a command or no handler claims it.
    pub async fn try_handle(
        &self,
        content: &str,
        sender: &Claim,
        target: Option<&UserId>,
    ) -> Option<CommandOutcome> {
        if !self.is_command(content) {
            return None;
        }

        let entries = self.handlers.read().await.clone();
        for entry in &entries {
            if self.faults.is_suspended(&entry.plugin) {
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| entry.handler.claims(content))) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(panic) => {
                    self.faults.record(&entry.plugin, &PluginFault::from_panic(panic));
                    continue;
                }
            }

            let invocation = CommandInvocation {
                content: content.to_string(),
                sender: sender.clone(),
                target: target.cloned(),
            };
            return Some(self.execute(entry, &invocation).await);
        }

        debug!(user_id = %sender.user_id, "No command claimed prefixed content");
        None
    }

    async fn execute(&self, entry: &CommandEntry, invocation: &CommandInvocation) -> CommandOutcome {
        let call = AssertUnwindSafe(entry.handler.execute(invocation)).catch_unwind();
        let result = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => Err(PluginFault::Timeout),
            Ok(Err(panic)) => Err(PluginFault::from_panic(panic)),
            Ok(Ok(Err(CommandError::Failed(msg)))) => Err(PluginFault::Error(msg)),
            Ok(Ok(Err(refusal))) => Ok(Some(refusal.to_string())),
            Ok(Ok(Ok(reply))) => Ok(reply),
        };

        let command = entry.handler.name().to_string();
        debug!(
            command = %command,
            plugin = %entry.plugin,
            user_id = %invocation.sender.user_id,
            "Command executed"
        );

        match result {
            Ok(reply) => CommandOutcome {
                command,
                plugin: entry.plugin.clone(),
                reply,
                faulted: false,
            },
            Err(fault) => {
                self.faults.record(&entry.plugin, &fault);
                let reason = match &fault {
                    PluginFault::Error(msg) => msg.clone(),
                    other => other.to_string(),
                };
                CommandOutcome {
                    command,
                    plugin: entry.plugin.clone(),
                    reply: Some(format!("Error executing command: {reason}")),
                    faulted: true,
                }
            }
        }
    }
}
