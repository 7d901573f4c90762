//! # relay-plugin
//!
//! Extensibility framework for the relay.
//!
//! - `hooks` — lifecycle phases, the hook context, and the sequential pipeline
//! - `commands` — the first-claim-wins command processor
//! - `faults` — per-plugin fault counting and suspension
//! - `registry` / `manager` — plugin descriptors, dependency ordering, activation
//! - `api` — services the relay exposes to plugins

pub mod api;
pub mod commands;
pub mod error;
pub mod faults;
pub mod hooks;
pub mod manager;
pub mod prelude;
pub mod registry;
pub mod traits;

pub use commands::{CommandHandler, CommandInvocation, CommandOutcome, CommandProcessor};
pub use error::{CommandError, HookError, PluginError};
pub use faults::{FaultTracker, PluginFault};
pub use hooks::{Directive, HookAction, HookContext, HookHandler, HookPayload, HookPhase, HookPipeline};
pub use manager::{LoadReport, PluginManager, PluginRegistrar};
pub use registry::{Plugin, PluginDescriptor, PluginInfo, PluginState};
