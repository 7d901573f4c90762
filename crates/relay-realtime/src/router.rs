//! Message router — orchestrates auth, hooks, commands, and delivery for
//! every connection.

use std::sync::Arc;

use tracing::{debug, info, warn};

use relay_auth::{AuthError, AuthMiddleware};
use relay_core::config::RealtimeConfig;
use relay_core::protocol::{Message, MessageType};
use relay_core::types::{Claim, UserId};
use relay_plugin::{CommandProcessor, HookContext, HookPhase, HookPipeline};

use crate::connection::{ConnectionHandle, ConnectionRegistry, ConnectionState, close_code};
use crate::error::{ConnectError, RoutingError};
use crate::metrics::{EngineMetrics, connections, messages};
use crate::session::SessionManager;

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Refused before routing; a SYSTEM reply explains why.
    Rejected(String),
    /// Heartbeat answered.
    Pong,
    /// A pre-message hook vetoed the message.
    Vetoed {
        /// Veto reason.
        reason: String,
    },
    /// A command handler claimed the content.
    Command {
        /// Claiming command.
        command: String,
        /// Whether the handler faulted.
        faulted: bool,
    },
    /// Delivered by broadcast or unicast.
    Delivered {
        /// Connections the message was queued for.
        recipients: usize,
    },
    /// Directed delivery failed; a SYSTEM reply explains why.
    Undeliverable(RoutingError),
    /// The connection was closed while handling the frame.
    Closed,
}

/// Routes traffic between connections.
#[derive(Debug)]
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    sessions: Arc<SessionManager>,
    auth: Arc<AuthMiddleware>,
    hooks: Arc<HookPipeline>,
    commands: Arc<CommandProcessor>,
    metrics: Arc<EngineMetrics>,
    config: RealtimeConfig,
}

impl MessageRouter {
    /// Creates a router over the engine's shared components.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        sessions: Arc<SessionManager>,
        auth: Arc<AuthMiddleware>,
        hooks: Arc<HookPipeline>,
        commands: Arc<CommandProcessor>,
        metrics: Arc<EngineMetrics>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            registry,
            sessions,
            auth,
            hooks,
            commands,
            metrics,
            config,
        }
    }

    /// Registers a new transport and runs the pre-connect hooks.
    pub async fn accept(
        &self,
        remote_address: Option<String>,
    ) -> Result<Arc<ConnectionHandle>, ConnectError> {
        let handle = Arc::new(ConnectionHandle::new(remote_address, &self.config));
        self.registry.register(handle.clone());
        if handle.transition(ConnectionState::Authenticating).is_err() {
            return Err(ConnectError::Closed);
        }

        info!(
            event = "connect",
            conn_id = %handle.id(),
            remote = handle.remote_address().unwrap_or("unknown"),
            "Connection accepted"
        );

        let ctx = self
            .hooks
            .dispatch(HookContext::connection(HookPhase::PreConnect, handle.info()))
            .await;
        if let Some((reason, plugin)) = ctx.veto() {
            let err = ConnectError::Rejected {
                plugin: plugin.to_string(),
                reason: reason.to_string(),
            };
            warn!(conn_id = %handle.id(), plugin = %plugin, reason = %reason, "Connection vetoed");
            self.sessions.release(
                &handle,
                close_code::REJECTED,
                &format!("Connection rejected: {reason}"),
            );
            return Err(err);
        }

        Ok(handle)
    }

    /// Validates a credential and brings the connection into its session.
    pub async fn authenticate(
        &self,
        handle: &Arc<ConnectionHandle>,
        credential: &str,
    ) -> Result<Claim, ConnectError> {
        if handle.state() != ConnectionState::Authenticating {
            return Err(ConnectError::Closed);
        }

        let claim = match self.auth.authenticate(credential) {
            Ok(claim) => claim,
            Err(e) => {
                self.reject_credential(handle, &e);
                return Err(e.into());
            }
        };

        if !self.registry.attach_identity(&handle.id(), claim.clone())
            || handle.transition(ConnectionState::Authenticated).is_err()
            || handle.transition(ConnectionState::Active).is_err()
        {
            return Err(ConnectError::Closed);
        }

        let outcome = self.sessions.on_connect(&claim, handle.id());
        for evicted in &outcome.evicted {
            if let Some(old) = self.registry.deregister(evicted) {
                old.close(close_code::TOO_MANY_DEVICES, "Kicked: too many devices");
                info!(
                    conn_id = %evicted,
                    user_id = %claim.user_id,
                    "Oldest connection evicted by connection cap"
                );
            }
        }
        // Closed concurrently: undo the attach so no empty session lingers.
        if self.registry.get(&handle.id()).is_none() {
            self.sessions.on_disconnect(handle.id());
            return Err(ConnectError::Closed);
        }

        info!(
            event = "connect",
            conn_id = %handle.id(),
            user_id = %claim.user_id,
            role = %claim.role,
            new_session = outcome.created,
            "Connection authenticated"
        );

        if let Some(session) = self.sessions.session(&claim.user_id) {
            let ctx = self
                .hooks
                .dispatch(HookContext::session(HookPhase::PostConnect, session))
                .await;
            if let Some((reason, plugin)) = ctx.veto() {
                let err = ConnectError::Rejected {
                    plugin: plugin.to_string(),
                    reason: reason.to_string(),
                };
                warn!(conn_id = %handle.id(), plugin = %plugin, reason = %reason, "Session vetoed");
                self.disconnect(handle, close_code::REJECTED, &format!("Connection rejected: {reason}"))
                    .await;
                return Err(err);
            }
        }

        Ok(claim)
    }

    fn reject_credential(&self, handle: &ConnectionHandle, err: &AuthError) {
        connections::record_auth_failure(&self.metrics);
        warn!(
            event = "auth_failure",
            conn_id = %handle.id(),
            reason = err.close_reason(),
            error = %err,
            "Credential rejected"
        );
        self.sessions
            .release(handle, AuthError::CLOSE_CODE, err.close_reason());
    }

    /// Handles one inbound text frame.
    pub async fn handle_inbound(&self, handle: &Arc<ConnectionHandle>, raw: &str) -> RouteOutcome {
        messages::record_received(&self.metrics);

        let claim = match handle.identity() {
            Some(claim) if handle.is_authenticated() => claim,
            _ => return self.refuse(handle, "Authentication required".to_string()),
        };
        self.sessions.on_heartbeat(handle.id());

        if raw.len() > self.config.max_message_bytes {
            return self.refuse(
                handle,
                format!(
                    "Message exceeds maximum size of {} bytes",
                    self.config.max_message_bytes
                ),
            );
        }
        let message = match Message::from_json(raw) {
            Ok(message) => message,
            Err(e) => return self.refuse(handle, e.message),
        };

        match message.kind() {
            MessageType::Heartbeat => {
                self.registry.send_to(handle, &Message::pong(&claim.user_id));
                RouteOutcome::Pong
            }
            MessageType::Text => self.route_text(handle, &claim, message).await,
            other => self.refuse(handle, format!("Unsupported message type: {}", other.as_str())),
        }
    }

    async fn route_text(
        &self,
        handle: &Arc<ConnectionHandle>,
        claim: &Claim,
        message: Message,
    ) -> RouteOutcome {
        let message = message.stamped(&claim.user_id);
        let is_command = self.commands.is_command(message.content());

        if message.is_directed() || is_command {
            if let Err(e) = self.auth.reverify(claim) {
                self.reject_credential(handle, &e);
                return RouteOutcome::Closed;
            }
        }

        let ctx = self
            .hooks
            .dispatch(HookContext::message(HookPhase::PreMessage, message.clone()))
            .await;
        if let Some((reason, plugin)) = ctx.veto() {
            debug!(
                conn_id = %handle.id(),
                user_id = %claim.user_id,
                plugin = %plugin,
                reason = %reason,
                "Message vetoed"
            );
            return RouteOutcome::Vetoed {
                reason: reason.to_string(),
            };
        }
        let message = ctx.into_message().unwrap_or(message);

        if is_command {
            if let Some(outcome) = self
                .commands
                .try_handle(message.content(), claim, message.target())
                .await
            {
                messages::record_command(&self.metrics);
                if let Some(reply) = &outcome.reply {
                    self.registry
                        .send_to(handle, &Message::command_result(reply.as_str(), &claim.user_id));
                }
                info!(
                    event = "message_routed",
                    conn_id = %handle.id(),
                    user_id = %claim.user_id,
                    command = %outcome.command,
                    plugin = %outcome.plugin,
                    faulted = outcome.faulted,
                    "Command handled"
                );
                self.post_message(message).await;
                return RouteOutcome::Command {
                    command: outcome.command,
                    faulted: outcome.faulted,
                };
            }
        }

        let recipients = match self.deliver(claim, &message) {
            Ok(recipients) => recipients,
            Err(e) => {
                self.registry
                    .send_to(handle, &Message::system(e.to_string(), Some(claim.user_id.clone())));
                debug!(conn_id = %handle.id(), error = %e, "Directed message undeliverable");
                return RouteOutcome::Undeliverable(e);
            }
        };

        info!(
            event = "message_routed",
            conn_id = %handle.id(),
            user_id = %claim.user_id,
            target = ?message.target().map(UserId::as_str),
            recipients,
            "Message routed"
        );
        self.post_message(message).await;
        RouteOutcome::Delivered { recipients }
    }

    fn deliver(&self, claim: &Claim, message: &Message) -> Result<usize, RoutingError> {
        let Some(target) = message.target() else {
            return Ok(self.registry.broadcast_authenticated(message));
        };
        if target.is_blank() {
            return Err(RoutingError::TargetUnknown);
        }
        if !self.sessions.is_online(target) {
            return Err(RoutingError::RecipientOffline(target.clone()));
        }

        let mut recipients = self.registry.unicast(message, target);
        if *target != claim.user_id {
            recipients += self.registry.unicast(message, &claim.user_id);
        }
        Ok(recipients)
    }

    async fn post_message(&self, message: Message) {
        // Vetoes are ignored here; the message has been delivered.
        self.hooks
            .dispatch(HookContext::message(HookPhase::PostMessage, message))
            .await;
    }

    fn refuse(&self, handle: &ConnectionHandle, reason: String) -> RouteOutcome {
        self.registry
            .send_to(handle, &Message::system(reason.as_str(), handle.user_id()));
        RouteOutcome::Rejected(reason)
    }

    /// Tears a connection down: pre-disconnect hooks, release, post-disconnect
    /// hooks. Safe to call from every path that ends a connection; the
    /// bookkeeping runs once and the hooks fire once per connection.
    pub async fn disconnect(&self, handle: &Arc<ConnectionHandle>, code: u16, reason: &str) {
        let notify = handle.take_disconnect_notice();
        if notify {
            let _ = handle.transition(ConnectionState::Disconnecting);
            self.hooks
                .dispatch(HookContext::connection(HookPhase::PreDisconnect, handle.info()))
                .await;
        }

        self.sessions.release(handle, code, reason);

        if notify {
            self.hooks
                .dispatch(HookContext::connection(HookPhase::PostDisconnect, handle.info()))
                .await;
        }
    }

    /// The connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The session manager.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }
}
