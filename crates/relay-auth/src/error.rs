//! Authentication failures.

use thiserror::Error;

use relay_core::error::AppError;

/// Why a credential was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token's `exp` is in the past.
    #[error("token has expired")]
    Expired,
    /// The token is not a well-formed JWT or its claims are unusable.
    #[error("malformed token: {0}")]
    Malformed(String),
    /// The signature does not match the configured secret.
    #[error("token signature is invalid")]
    SignatureInvalid,
    /// The token id has been revoked.
    #[error("token has been revoked")]
    Revoked,
}

impl AuthError {
    /// WebSocket close code used for every authentication failure (policy violation).
    pub const CLOSE_CODE: u16 = 1008;

    /// Close reason sent to the peer.
    pub fn close_reason(&self) -> &'static str {
        match self {
            Self::Expired => "TOKEN_EXPIRED",
            Self::Malformed(_) => "INVALID_TOKEN",
            Self::SignatureInvalid => "INVALID_SIGNATURE",
            Self::Revoked => "TOKEN_REVOKED",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::authentication(err.to_string())
    }
}
