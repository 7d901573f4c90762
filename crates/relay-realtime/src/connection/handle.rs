//! Individual connection handle.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use relay_core::config::RealtimeConfig;
use relay_core::types::{Claim, ConnectionId, ConnectionInfo, UserId};

use super::queue::{OutboundQueue, PushOutcome};
use super::state::{ConnectionState, InvalidTransition};

/// A handle to a single live transport.
///
/// Holds the outbound queue drained by the connection's writer task, the
/// cancellation token its tasks select on, and the identity once the
/// credential has been accepted.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    remote_address: Option<String>,
    connected_at: DateTime<Utc>,
    /// Milliseconds since the epoch.
    last_activity: AtomicI64,
    identity: RwLock<Option<Claim>>,
    state: Mutex<ConnectionState>,
    queue: OutboundQueue,
    cancel: CancellationToken,
    disconnect_noticed: AtomicBool,
}

impl ConnectionHandle {
    /// Creates a handle in the `Connecting` state.
    pub fn new(remote_address: Option<String>, config: &RealtimeConfig) -> Self {
        let now = Utc::now();
        Self {
            id: ConnectionId::new(),
            remote_address,
            connected_at: now,
            last_activity: AtomicI64::new(now.timestamp_millis()),
            identity: RwLock::new(None),
            state: Mutex::new(ConnectionState::Connecting),
            queue: OutboundQueue::new(config.outbound_buffer_size, config.overflow_policy),
            cancel: CancellationToken::new(),
            disconnect_noticed: AtomicBool::new(false),
        }
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Peer address reported by the transport.
    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    /// Accept time.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Last inbound traffic.
    pub fn last_activity(&self) -> DateTime<Utc> {
        let millis = self.last_activity.load(Ordering::Relaxed);
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or(self.connected_at)
    }

    /// Records inbound traffic. An idle connection becomes active again.
    pub fn touch(&self) {
        self.last_activity
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        let mut state = self.lock_state();
        if *state == ConnectionState::Idle {
            *state = ConnectionState::Active;
        }
    }

    /// Claim recorded at authentication.
    pub fn identity(&self) -> Option<Claim> {
        self.identity
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Authenticated user, if any.
    pub fn user_id(&self) -> Option<UserId> {
        self.identity
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|c| c.user_id.clone())
    }

    pub(crate) fn set_identity(&self, claim: Claim) {
        *self
            .identity
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(claim);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.lock_state()
    }

    /// Moves to `next` if the state machine allows it.
    pub fn transition(&self, next: ConnectionState) -> Result<(), InvalidTransition> {
        let mut state = self.lock_state();
        if !state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: *state,
                to: next,
            });
        }
        *state = next;
        Ok(())
    }

    /// Returns `true` while the connection may send and receive chat traffic.
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// Returns `true` once the connection reached `Closed`.
    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Queues a serialized message.
    pub fn send(&self, text: Arc<str>) -> PushOutcome {
        self.queue.push(text)
    }

    /// Closes the connection: queues the close frame, cancels the
    /// connection's tasks, and moves to `Closed`. Returns `false` if it was
    /// already closed.
    pub fn close(&self, code: u16, reason: &str) -> bool {
        {
            let mut state = self.lock_state();
            if *state == ConnectionState::Closed {
                return false;
            }
            *state = ConnectionState::Closed;
        }
        self.queue.close(code, reason);
        self.cancel.cancel();
        true
    }

    /// Outbound queue, drained by the writer task.
    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    /// Token cancelled when the connection closes.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns `true` exactly once, for whoever first reports the
    /// connection's end to the disconnect hooks.
    pub(crate) fn take_disconnect_notice(&self) -> bool {
        !self.disconnect_noticed.swap(true, Ordering::AcqRel)
    }

    /// Read-only snapshot.
    pub fn info(&self) -> ConnectionInfo {
        let identity = self.identity();
        ConnectionInfo {
            connection_id: self.id,
            user_id: identity.as_ref().map(|c| c.user_id.clone()),
            role: identity.as_ref().map(|c| c.role),
            remote_address: self.remote_address.clone(),
            connected_at: self.connected_at,
            last_activity_at: self.last_activity(),
        }
    }
}
