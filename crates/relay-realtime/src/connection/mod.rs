//! Connection management — handles, outbound queues, lifecycle states, registry.

pub mod handle;
pub mod queue;
pub mod registry;
pub mod state;

pub use handle::ConnectionHandle;
pub use queue::{Frame, OutboundQueue, PushOutcome};
pub use registry::ConnectionRegistry;
pub use state::{ConnectionState, InvalidTransition, close_code};
