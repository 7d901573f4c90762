//! Wire protocol shared by the router, the hook pipeline, and plugins.

pub mod message;

pub use message::{Message, MessageType, SYSTEM_SENDER};
