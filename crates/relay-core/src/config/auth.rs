//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Bearer token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify HS256 tokens.
    #[serde(default = "default_secret")]
    pub jwt_secret: String,
    /// Lifetime of issued tokens in minutes.
    #[serde(default = "default_ttl")]
    pub token_ttl_minutes: i64,
    /// Clock-skew leeway applied to expiry checks, in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
    /// How long a connection may wait before presenting a credential.
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_secret(),
            token_ttl_minutes: default_ttl(),
            leeway_seconds: default_leeway(),
            auth_timeout_seconds: default_auth_timeout(),
        }
    }
}

fn default_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_ttl() -> i64 {
    60
}

fn default_leeway() -> u64 {
    0
}

fn default_auth_timeout() -> u64 {
    10
}
