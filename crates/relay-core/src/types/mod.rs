//! Core type definitions used across the relay workspace.

pub mod id;
pub mod identity;
pub mod presence;
pub mod role;

pub use id::{ConnectionId, UserId};
pub use identity::Claim;
pub use presence::{ConnectionInfo, SessionInfo, SessionStatus};
pub use role::Role;
