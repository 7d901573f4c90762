//! Command handlers contributed by the built-in plugin.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::types::UserId;
use relay_plugin::prelude::*;

/// `/help` (aliases `/?`, `/h`): lists available commands.
#[derive(Debug)]
pub struct HelpCommand {
    context: PluginContext,
}

impl HelpCommand {
    /// Create a new help command.
    pub fn new(context: PluginContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl CommandHandler for HelpCommand {
    fn name(&self) -> &str {
        "/help"
    }

    fn description(&self) -> &str {
        "Show available commands"
    }

    fn claims(&self, content: &str) -> bool {
        matches_command(content, &["/help", "/?", "/h"])
    }

    async fn execute(&self, _inv: &CommandInvocation) -> Result<Option<String>, CommandError> {
        let mut text = String::from("Available commands:");
        for command in self.context.commands.list_commands().await {
            text.push_str(&format!("\n  {} - {}", command.name, command.description));
        }
        Ok(Some(text))
    }
}

/// `/echo <text>`: replies with the text.
#[derive(Debug, Default)]
pub struct EchoCommand;

#[async_trait]
impl CommandHandler for EchoCommand {
    fn name(&self) -> &str {
        "/echo"
    }

    fn description(&self) -> &str {
        "Echo back the message"
    }

    fn claims(&self, content: &str) -> bool {
        matches_command(content, &["/echo"])
    }

    async fn execute(&self, inv: &CommandInvocation) -> Result<Option<String>, CommandError> {
        match inv.args() {
            "" => Err(CommandError::Usage("/echo <text>".to_string())),
            text => Ok(Some(format!("Echo: {text}"))),
        }
    }
}

/// `/who`: lists online users.
pub struct WhoCommand {
    sessions: Arc<dyn SessionControl>,
}

impl WhoCommand {
    /// Create a new who command.
    pub fn new(sessions: Arc<dyn SessionControl>) -> Self {
        Self { sessions }
    }
}

impl std::fmt::Debug for WhoCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhoCommand").finish()
    }
}

#[async_trait]
impl CommandHandler for WhoCommand {
    fn name(&self) -> &str {
        "/who"
    }

    fn description(&self) -> &str {
        "List online users"
    }

    fn claims(&self, content: &str) -> bool {
        matches_command(content, &["/who"])
    }

    async fn execute(&self, _inv: &CommandInvocation) -> Result<Option<String>, CommandError> {
        let sessions = self.sessions.list_online().await;
        let mut text = format!("Online users ({}):", sessions.len());
        for session in &sessions {
            text.push_str(&format!(
                "\n  {} [{}]",
                session.user_id,
                session.status.as_str()
            ));
        }
        Ok(Some(text))
    }
}

/// `/kick <user> [reason]`: admin only; force-disconnects a user.
pub struct KickCommand {
    sessions: Arc<dyn SessionControl>,
}

impl KickCommand {
    /// Create a new kick command.
    pub fn new(sessions: Arc<dyn SessionControl>) -> Self {
        Self { sessions }
    }
}

impl std::fmt::Debug for KickCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KickCommand").finish()
    }
}

#[async_trait]
impl CommandHandler for KickCommand {
    fn name(&self) -> &str {
        "/kick"
    }

    fn description(&self) -> &str {
        "Disconnect a user (admin)"
    }

    fn claims(&self, content: &str) -> bool {
        matches_command(content, &["/kick"])
    }

    async fn execute(&self, inv: &CommandInvocation) -> Result<Option<String>, CommandError> {
        if !inv.sender.role.is_admin() {
            return Err(CommandError::Forbidden("/kick requires admin".to_string()));
        }

        let mut words = inv.args().splitn(2, char::is_whitespace);
        let Some(target) = words.next().filter(|w| !w.is_empty()) else {
            return Err(CommandError::Usage("/kick <user> [reason]".to_string()));
        };
        let reason = words
            .next()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("removed by admin");

        let target = UserId::from(target);
        let closed = self.sessions.force_disconnect(&target, reason).await;
        tracing::info!(
            admin = %inv.sender.user_id,
            target = %target,
            closed,
            "Kick command executed"
        );

        if closed == 0 {
            Ok(Some(format!("User {target} is not online")))
        } else {
            Ok(Some(format!("Kicked {target} ({closed} connection(s))")))
        }
    }
}
