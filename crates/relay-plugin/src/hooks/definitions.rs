//! Hook phase definitions and the per-dispatch context.

use std::fmt;

use serde::{Deserialize, Serialize};

use relay_core::protocol::Message;
use relay_core::types::{ConnectionInfo, SessionInfo};

/// Lifecycle points where plugins may observe or intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    /// A transport was accepted; no identity yet. Payload: connection.
    PreConnect,
    /// Authentication succeeded and the session was updated. Payload: session.
    PostConnect,
    /// An authenticated TEXT message is about to be routed. Payload: message.
    PreMessage,
    /// A message was routed. Payload: message.
    PostMessage,
    /// A connection is about to be released. Payload: connection.
    PreDisconnect,
    /// A connection was released. Payload: connection.
    PostDisconnect,
}

impl HookPhase {
    /// All phases, in lifecycle order.
    pub const ALL: [HookPhase; 6] = [
        Self::PreConnect,
        Self::PostConnect,
        Self::PreMessage,
        Self::PostMessage,
        Self::PreDisconnect,
        Self::PostDisconnect,
    ];

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreConnect => "pre_connect",
            Self::PostConnect => "post_connect",
            Self::PreMessage => "pre_message",
            Self::PostMessage => "post_message",
            Self::PreDisconnect => "pre_disconnect",
            Self::PostDisconnect => "post_disconnect",
        }
    }

    /// Whether a `Veto` in this phase has an effect.
    ///
    /// Pre-connect and pre-message vetoes abort the event; a post-connect
    /// veto disconnects the freshly authenticated connection. Elsewhere
    /// the event has already happened and the veto is ignored.
    pub fn accepts_veto(&self) -> bool {
        matches!(self, Self::PreConnect | Self::PostConnect | Self::PreMessage)
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The event a hook sees.
#[derive(Debug, Clone, PartialEq)]
pub enum HookPayload {
    /// Connection snapshot.
    Connection(ConnectionInfo),
    /// Session snapshot.
    Session(SessionInfo),
    /// In-flight message.
    Message(Message),
}

impl HookPayload {
    /// Short name of the payload kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Message(_) => "message",
        }
    }
}

/// Control signal produced by a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Directive {
    /// Proceed normally.
    #[default]
    Continue,
    /// Later hooks were skipped; the router still proceeds.
    ShortCircuit,
    /// Abort the event.
    Veto {
        /// Reason given by the vetoing plugin.
        reason: String,
    },
}

/// What a single hook callback asks the pipeline to do.
#[derive(Debug, Clone, PartialEq)]
pub enum HookAction {
    /// Pass the context on unchanged.
    Continue,
    /// Pass on a substituted payload. Only message payloads may be
    /// replaced, and the sender must stay the same.
    Replace(HookPayload),
    /// Stop running hooks for this phase, optionally substituting first.
    ShortCircuit(Option<HookPayload>),
    /// Abort the event.
    Veto {
        /// Human-readable reason, logged by the router.
        reason: String,
    },
}

impl HookAction {
    /// Convenience constructor for `Veto`.
    pub fn veto(reason: impl Into<String>) -> Self {
        Self::Veto {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for replacing the message.
    pub fn replace_message(message: Message) -> Self {
        Self::Replace(HookPayload::Message(message))
    }
}

/// One lifecycle event travelling through the pipeline.
///
/// Each successful callback yields a new context; the pipeline never
/// hands a callback a context another callback is still looking at.
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext {
    phase: HookPhase,
    payload: HookPayload,
    directive: Directive,
    decided_by: Option<String>,
}

impl HookContext {
    /// Creates a context with a `Continue` directive.
    pub fn new(phase: HookPhase, payload: HookPayload) -> Self {
        Self {
            phase,
            payload,
            directive: Directive::Continue,
            decided_by: None,
        }
    }

    /// Context for a connection event.
    pub fn connection(phase: HookPhase, info: ConnectionInfo) -> Self {
        Self::new(phase, HookPayload::Connection(info))
    }

    /// Context for a session event.
    pub fn session(phase: HookPhase, info: SessionInfo) -> Self {
        Self::new(phase, HookPayload::Session(info))
    }

    /// Context for a message event.
    pub fn message(phase: HookPhase, message: Message) -> Self {
        Self::new(phase, HookPayload::Message(message))
    }

    /// Phase being dispatched.
    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    /// Current payload.
    pub fn payload(&self) -> &HookPayload {
        &self.payload
    }

    /// Current directive.
    pub fn directive(&self) -> &Directive {
        &self.directive
    }

    /// The message payload, if this is a message event.
    pub fn as_message(&self) -> Option<&Message> {
        match &self.payload {
            HookPayload::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Consumes the context and returns its message payload.
    pub fn into_message(self) -> Option<Message> {
        match self.payload {
            HookPayload::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Returns `true` if a plugin vetoed the event.
    pub fn is_vetoed(&self) -> bool {
        matches!(self.directive, Directive::Veto { .. })
    }

    /// Veto reason and vetoing plugin, if vetoed.
    pub fn veto(&self) -> Option<(&str, &str)> {
        match &self.directive {
            Directive::Veto { reason } => {
                Some((reason.as_str(), self.decided_by.as_deref().unwrap_or("unknown")))
            }
            _ => None,
        }
    }

    /// Plugin that short-circuited or vetoed the dispatch.
    pub fn decided_by(&self) -> Option<&str> {
        self.decided_by.as_deref()
    }

    pub(crate) fn with_payload(self, payload: HookPayload) -> Self {
        Self { payload, ..self }
    }

    pub(crate) fn with_directive(self, directive: Directive, plugin: Option<&str>) -> Self {
        Self {
            directive,
            decided_by: plugin.map(str::to_string),
            ..self
        }
    }
}
