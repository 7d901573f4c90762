//! Built-in plugin implementation — registers with the relay plugin system.

use std::sync::Arc;

use async_trait::async_trait;
use relay_plugin::prelude::*;

use crate::commands::{EchoCommand, HelpCommand, KickCommand, WhoCommand};
use crate::hooks::PresenceLogHook;

/// Plugin name used to tag every registration.
pub const PLUGIN_NAME: &str = "builtin";

/// Built-in commands and presence logging.
#[derive(Debug, Default)]
pub struct BuiltinPlugin;

impl BuiltinPlugin {
    /// Create a new built-in plugin
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for BuiltinPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new(PLUGIN_NAME, env!("CARGO_PKG_VERSION"))
            .with_description("Help, echo, who, and kick commands")
            .with_author("Relay Team")
    }

    async fn activate(
        &self,
        ctx: &PluginContext,
        registrar: &mut PluginRegistrar<'_>,
    ) -> Result<(), PluginError> {
        registrar.command(Arc::new(HelpCommand::new(ctx.clone()))).await;
        registrar.command(Arc::new(EchoCommand)).await;
        registrar
            .command(Arc::new(WhoCommand::new(ctx.sessions.clone())))
            .await;
        registrar
            .command(Arc::new(KickCommand::new(ctx.sessions.clone())))
            .await;

        let presence: Arc<dyn HookHandler> = Arc::new(PresenceLogHook);
        registrar.hook(HookPhase::PostConnect, presence.clone()).await;
        registrar.hook(HookPhase::PostDisconnect, presence).await;

        tracing::info!("Built-in commands registered: /help, /echo, /who, /kick");
        Ok(())
    }
}
