//! JWT claims structure carried by relay bearer tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use relay_core::types::{Claim, Role, UserId};

use crate::error::AuthError;

/// JWT claims payload.
///
/// Only `sub` and `exp` are required; tokens minted by simpler issuers
/// that omit `role`, `name`, or `jti` are accepted with defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — the user id.
    pub sub: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Role at the time of issuance.
    #[serde(default = "default_role")]
    pub role: Role,
    /// Issued-at timestamp (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// JWT ID for revocation tracking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<Uuid>,
}

fn default_role() -> Role {
    Role::User
}

impl TokenClaims {
    /// Converts verified token claims into the identity claim used by the core.
    pub fn into_claim(self) -> Result<Claim, AuthError> {
        if self.sub.trim().is_empty() {
            return Err(AuthError::Malformed("empty subject".to_string()));
        }

        let expires_at = DateTime::from_timestamp(self.exp, 0)
            .ok_or_else(|| AuthError::Malformed("exp out of range".to_string()))?;
        let issued_at = match self.iat {
            Some(iat) => DateTime::from_timestamp(iat, 0)
                .ok_or_else(|| AuthError::Malformed("iat out of range".to_string()))?,
            None => Utc::now(),
        };

        Ok(Claim {
            display_name: self.name.unwrap_or_else(|| self.sub.clone()),
            user_id: UserId::new(self.sub),
            role: self.role,
            token_id: self.jti.unwrap_or_else(Uuid::nil),
            issued_at,
            expires_at,
        })
    }
}
