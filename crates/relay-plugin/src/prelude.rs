//! Prelude for plugin authors.

pub use async_trait::async_trait;

pub use crate::api::context::{PluginContext, SessionControl};
pub use crate::commands::{CommandHandler, CommandInvocation, matches_command};
pub use crate::error::{CommandError, HookError, PluginError};
pub use crate::hooks::definitions::{HookAction, HookContext, HookPayload, HookPhase};
pub use crate::hooks::registry::HookHandler;
pub use crate::manager::PluginRegistrar;
pub use crate::registry::{Plugin, PluginDescriptor};
pub use crate::traits::FnHook;
