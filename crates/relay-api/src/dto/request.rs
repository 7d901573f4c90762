//! Request DTOs.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/admin/kick-user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KickUserRequest {
    /// User to disconnect.
    pub user_id: String,
    /// Reason shown to the user in the close frame.
    #[serde(default)]
    pub reason: Option<String>,
}

/// First-frame credential: either a raw token or `{"token": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthFrame {
    /// Bearer token.
    pub token: String,
}
