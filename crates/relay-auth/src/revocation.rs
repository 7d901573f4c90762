//! In-memory set of revoked token ids.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// Revoked token ids, each remembered until the token would have expired anyway.
#[derive(Debug, Default)]
pub struct RevocationList {
    /// `jti` → time after which the entry can be forgotten.
    revoked: DashMap<Uuid, DateTime<Utc>>,
}

impl RevocationList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Revokes a token id until `until`.
    pub fn revoke(&self, token_id: Uuid, until: DateTime<Utc>) {
        self.revoked.insert(token_id, until);
        tracing::info!(token_id = %token_id, until = %until, "Token revoked");
    }

    /// Returns `true` if the token id is revoked.
    pub fn is_revoked(&self, token_id: &Uuid) -> bool {
        self.revoked.contains_key(token_id)
    }

    /// Drops entries whose tokens have expired on their own. Returns the
    /// number removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.revoked.len();
        self.revoked.retain(|_, until| *until > now);
        before - self.revoked.len()
    }

    /// Number of revoked ids currently tracked.
    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    /// Returns `true` if nothing is revoked.
    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_purge_keeps_live_entries() {
        let list = RevocationList::new();
        let now = Utc::now();
        let stale = Uuid::new_v4();
        let live = Uuid::new_v4();
        list.revoke(stale, now - Duration::seconds(1));
        list.revoke(live, now + Duration::minutes(10));

        assert_eq!(list.purge_expired(now), 1);
        assert!(!list.is_revoked(&stale));
        assert!(list.is_revoked(&live));
    }
}
