//! Routing and connection errors.

use thiserror::Error;

use relay_auth::AuthError;
use relay_core::error::AppError;
use relay_core::types::UserId;

/// A directed message could not be delivered. Reported to the sender as a
/// SYSTEM message; the connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// The target has no session.
    #[error("User {0} is not online")]
    RecipientOffline(UserId),
    /// The target is blank.
    #[error("Message target is empty")]
    TargetUnknown,
}

impl From<RoutingError> for AppError {
    fn from(err: RoutingError) -> Self {
        AppError::routing(err.to_string())
    }
}

/// A connection was refused during accept or authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// The credential was rejected. Closed with 1008.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// A connect hook vetoed the connection. Closed with 4003.
    #[error("connection rejected by plugin '{plugin}': {reason}")]
    Rejected {
        /// Vetoing plugin.
        plugin: String,
        /// Veto reason.
        reason: String,
    },
    /// The connection closed before the step completed.
    #[error("connection is closed")]
    Closed,
}

impl From<ConnectError> for AppError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Auth(auth) => auth.into(),
            ConnectError::Rejected { .. } => AppError::authorization(err.to_string()),
            ConnectError::Closed => AppError::transport(err.to_string()),
        }
    }
}
