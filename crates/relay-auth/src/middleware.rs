//! The authentication contract used by the message router.

use std::sync::Arc;

use chrono::{Duration, Utc};

use relay_core::config::AuthConfig;
use relay_core::types::Claim;

use crate::error::AuthError;
use crate::jwt::JwtDecoder;
use crate::revocation::RevocationList;

/// Turns bearer credentials into identity claims.
///
/// `authenticate` runs at connection time; `reverify` runs before every
/// privileged action so that a token which expired or was revoked
/// mid-session stops working there too.
#[derive(Debug, Clone)]
pub struct AuthMiddleware {
    decoder: JwtDecoder,
    revocations: Arc<RevocationList>,
    leeway: Duration,
}

impl AuthMiddleware {
    /// Creates the middleware with an empty revocation list.
    pub fn new(config: &AuthConfig) -> Self {
        Self::with_revocations(config, Arc::new(RevocationList::new()))
    }

    /// Creates the middleware sharing an existing revocation list.
    pub fn with_revocations(config: &AuthConfig, revocations: Arc<RevocationList>) -> Self {
        Self {
            decoder: JwtDecoder::new(config),
            revocations,
            leeway: Duration::seconds(i64::try_from(config.leeway_seconds).unwrap_or(i64::MAX)),
        }
    }

    /// Validates a credential and derives its claim.
    pub fn authenticate(&self, credential: &str) -> Result<Claim, AuthError> {
        let claim = self.decoder.decode(credential.trim())?.into_claim()?;

        if self.revocations.is_revoked(&claim.token_id) {
            return Err(AuthError::Revoked);
        }

        tracing::debug!(
            user_id = %claim.user_id,
            role = %claim.role,
            expires_at = %claim.expires_at,
            "Credential verified"
        );
        Ok(claim)
    }

    /// Re-checks expiry against the wall clock and the revocation list.
    pub fn reverify(&self, claim: &Claim) -> Result<(), AuthError> {
        if claim.is_expired_at(Utc::now() - self.leeway) {
            return Err(AuthError::Expired);
        }
        if self.revocations.is_revoked(&claim.token_id) {
            return Err(AuthError::Revoked);
        }
        Ok(())
    }

    /// Revokes the token behind `claim` until it would have expired.
    pub fn revoke(&self, claim: &Claim) {
        self.revocations.revoke(claim.token_id, claim.expires_at);
    }

    /// The shared revocation list.
    pub fn revocations(&self) -> &Arc<RevocationList> {
        &self.revocations
    }
}
