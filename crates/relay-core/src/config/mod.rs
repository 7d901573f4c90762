//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate.
//! Each sub-module represents a logical configuration section, and every
//! field has a serde default so an empty source yields a runnable relay.

pub mod app;
pub mod auth;
pub mod logging;
pub mod plugin;
pub mod realtime;
pub mod session;

use serde::{Deserialize, Serialize};

pub use self::app::ServerConfig;
pub use self::auth::AuthConfig;
pub use self::logging::LoggingConfig;
pub use self::plugin::PluginConfig;
pub use self::realtime::{OverflowPolicy, RealtimeConfig};
pub use self::session::SessionConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Merged from `config/default.toml`, an environment overlay, and
/// `RELAY__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Token verification settings.
    pub auth: AuthConfig,
    /// Presence and liveness settings.
    pub session: SessionConfig,
    /// Outbound delivery settings.
    pub realtime: RealtimeConfig,
    /// Plugin framework settings.
    pub plugins: PluginConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files and the environment.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `RELAY__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from an inline TOML document.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
