//! Verified identity facts extracted from a bearer credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id::UserId;
use super::role::Role;

/// Identity claim derived from a verified token.
///
/// A claim is never updated in place; re-authentication produces a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Subject of the token.
    pub user_id: UserId,
    /// Human-readable name, defaults to the user id.
    pub display_name: String,
    /// Role granted by the issuer.
    pub role: Role,
    /// Unique token id (`jti`), used for revocation.
    pub token_id: Uuid,
    /// Issued-at time.
    pub issued_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

impl Claim {
    /// Returns `true` if the claim has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds until expiry (negative once expired).
    pub fn remaining_ttl_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}
