//! Bounded per-connection outbound queue.
//!
//! Producers never wait: a push either enqueues, applies the overflow
//! policy, or reports that the queue is closed. The connection's writer
//! task is the only consumer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use relay_core::config::OverflowPolicy;

/// One item for the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Serialized message.
    Text(Arc<str>),
    /// Close the transport with this code and reason. Always the last frame.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Result of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Enqueued.
    Queued,
    /// Enqueued after discarding the oldest frame.
    DroppedOldest,
    /// Queue full under the `disconnect` policy; nothing was enqueued.
    Overflow,
    /// The queue has been closed.
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<Frame>,
    closed: bool,
}

/// Bounded FIFO of frames for a single connection.
#[derive(Debug)]
pub struct OutboundQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
    policy: OverflowPolicy,
}

impl OutboundQueue {
    /// Creates a queue holding at most `capacity` text frames.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enqueues a text frame without waiting.
    pub fn push(&self, text: Arc<str>) -> PushOutcome {
        let outcome = {
            let mut state = self.lock();
            if state.closed {
                return PushOutcome::Closed;
            }
            if state.frames.len() >= self.capacity {
                match self.policy {
                    OverflowPolicy::Disconnect => return PushOutcome::Overflow,
                    OverflowPolicy::DropOldest => {
                        state.frames.pop_front();
                        state.frames.push_back(Frame::Text(text));
                        PushOutcome::DroppedOldest
                    }
                }
            } else {
                state.frames.push_back(Frame::Text(text));
                PushOutcome::Queued
            }
        };
        self.notify.notify_one();
        outcome
    }

    /// Closes the queue. Frames already queued are still delivered, followed
    /// by the close frame. Returns `false` if the queue was already closed.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            state.frames.push_back(Frame::Close {
                code,
                reason: reason.into(),
            });
        }
        self.notify.notify_one();
        true
    }

    /// Waits for the next frame. Returns `None` once the queue is closed
    /// and drained.
    pub async fn recv(&self) -> Option<Frame> {
        loop {
            {
                let mut state = self.lock();
                if let Some(frame) = state.frames.pop_front() {
                    return Some(frame);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Takes the next frame if one is ready.
    pub fn try_recv(&self) -> Option<Frame> {
        self.lock().frames.pop_front()
    }

    /// Frames currently queued.
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    /// Returns `true` if no frames are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
