//! Presence tracking: sessions, liveness sweep.

pub mod manager;
pub mod sweeper;

pub use manager::{ConnectOutcome, SessionManager, SweepReport};
pub use sweeper::spawn_sweeper;
