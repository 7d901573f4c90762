//! Services the relay exposes to plugins.

pub mod context;

pub use context::{PluginContext, SessionControl};
