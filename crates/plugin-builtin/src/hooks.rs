//! Hook implementations for the built-in plugin.

use async_trait::async_trait;
use relay_plugin::prelude::*;

/// Logs session starts and connection ends.
#[derive(Debug, Default)]
pub struct PresenceLogHook;

#[async_trait]
impl HookHandler for PresenceLogHook {
    async fn handle(&self, ctx: &HookContext) -> Result<HookAction, HookError> {
        match ctx.payload() {
            HookPayload::Session(session) => tracing::info!(
                phase = %ctx.phase(),
                user_id = %session.user_id,
                connections = session.connection_ids.len(),
                "Session active"
            ),
            HookPayload::Connection(conn) => tracing::debug!(
                phase = %ctx.phase(),
                conn_id = %conn.connection_id,
                user_id = ?conn.user_id.as_ref().map(|u| u.as_str()),
                "Connection ended"
            ),
            HookPayload::Message(_) => {}
        }
        Ok(HookAction::Continue)
    }
}
