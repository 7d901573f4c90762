//! # relay-realtime
//!
//! Connection, presence, and routing engine for the relay. Provides:
//!
//! - A connection registry with bounded per-connection outbound queues
//! - Sessions aggregating a user's connections, with JOIN/LEAVE and a liveness sweep
//! - The message router running auth, hooks, commands, and fan-out
//! - The `RelayEngine` that wires everything together

pub mod connection;
pub mod error;
pub mod metrics;
pub mod router;
pub mod server;
pub mod session;

pub use connection::{ConnectionHandle, ConnectionRegistry, ConnectionState, Frame, close_code};
pub use error::{ConnectError, RoutingError};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use router::{MessageRouter, RouteOutcome};
pub use server::{RelayEngine, SystemStatus};
pub use session::SessionManager;
