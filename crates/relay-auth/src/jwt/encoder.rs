//! JWT token creation with configurable signing and TTL.

use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use relay_core::config::AuthConfig;
use relay_core::error::AppError;
use relay_core::types::{Claim, Role, UserId};

use super::claims::TokenClaims;

/// Creates signed HS256 tokens.
///
/// The relay itself never logs anyone in; this is the minting half used
/// by whatever collaborator issues credentials, and by tests.
#[derive(Clone)]
pub struct JwtEncoder {
    /// HMAC secret key for signing.
    encoding_key: EncodingKey,
    /// Token TTL.
    ttl: Duration,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder").field("ttl", &self.ttl).finish()
    }
}

/// A freshly minted token and the claim it encodes.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWT string.
    pub token: String,
    /// Claim the token will verify to.
    pub claim: Claim,
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl: Duration::minutes(config.token_ttl_minutes),
        }
    }

    /// Issues a token with the configured TTL.
    pub fn issue(
        &self,
        user_id: &UserId,
        display_name: &str,
        role: Role,
    ) -> Result<IssuedToken, AppError> {
        self.issue_with_ttl(user_id, display_name, role, self.ttl)
    }

    /// Issues a token with an explicit TTL. A negative TTL yields an
    /// already-expired token.
    pub fn issue_with_ttl(
        &self,
        user_id: &UserId,
        display_name: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<IssuedToken, AppError> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let jti = Uuid::new_v4();

        let claims = TokenClaims {
            sub: user_id.as_str().to_string(),
            name: Some(display_name.to_string()),
            role,
            iat: Some(now.timestamp()),
            exp: expires_at.timestamp(),
            jti: Some(jti),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode token: {e}")))?;

        let claim = claims
            .into_claim()
            .map_err(|e| AppError::internal(format!("Issued unusable claims: {e}")))?;

        Ok(IssuedToken { token, claim })
    }
}
