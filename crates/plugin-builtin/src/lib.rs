//! Built-in plugin for the relay.
//!
//! Contributes the everyday chat commands (`/help`, `/echo`, `/who`,
//! `/kick`) and a presence hook that logs session starts and connection
//! ends.

pub mod commands;
pub mod hooks;
pub mod plugin;

pub use plugin::BuiltinPlugin;
