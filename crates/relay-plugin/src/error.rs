//! Errors raised by plugins and by the plugin manager.

use thiserror::Error;

use relay_core::error::AppError;

/// Plugin manager failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    /// A plugin with this name is already active.
    #[error("plugin '{0}' is already loaded")]
    AlreadyLoaded(String),
    /// No active plugin has this name.
    #[error("plugin '{0}' is not loaded")]
    NotFound(String),
    /// A declared dependency is not active.
    #[error("plugin '{plugin}' requires '{dependency}', which is not loaded")]
    MissingDependency {
        /// Plugin being loaded.
        plugin: String,
        /// Absent dependency.
        dependency: String,
    },
    /// Dependencies form a cycle.
    #[error("dependency cycle among plugins: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),
    /// Other active plugins depend on this one.
    #[error("plugin '{plugin}' is required by: {}", .dependents.join(", "))]
    HasDependents {
        /// Plugin being unloaded.
        plugin: String,
        /// Active dependents.
        dependents: Vec<String>,
    },
    /// The plugin's own activation code failed.
    #[error("plugin '{plugin}' failed to activate: {reason}")]
    ActivationFailed {
        /// Plugin being loaded.
        plugin: String,
        /// Failure description.
        reason: String,
    },
}

impl From<PluginError> for AppError {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::NotFound(_) => AppError::not_found(err.to_string()),
            PluginError::AlreadyLoaded(_) | PluginError::HasDependents { .. } => {
                AppError::conflict(err.to_string())
            }
            _ => AppError::plugin(err.to_string()),
        }
    }
}

/// Error returned by a hook callback. Counted as a plugin fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    /// Creates a hook error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Error returned by a command handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The sender may not run this command. Not a plugin fault.
    #[error("Permission denied: {0}")]
    Forbidden(String),
    /// The command could not be parsed. Not a plugin fault.
    #[error("Usage: {0}")]
    Usage(String),
    /// The handler failed. Counted as a plugin fault.
    #[error("{0}")]
    Failed(String),
}
