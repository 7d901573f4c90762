//! JWT token validation.
//!
//! Verification is ordered cheapest first: structural shape, then the
//! HMAC signature, then expiry. Revocation is layered on top by
//! [`AuthMiddleware`](crate::middleware::AuthMiddleware).

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use relay_core::config::AuthConfig;

use crate::error::AuthError;

use super::claims::TokenClaims;

/// Validates HS256 tokens.
#[derive(Clone)]
pub struct JwtDecoder {
    /// HMAC secret key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Decodes and validates a compact token string.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, AuthError> {
        check_shape(token)?;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                JwtErrorKind::ExpiredSignature => AuthError::Expired,
                JwtErrorKind::InvalidSignature => AuthError::SignatureInvalid,
                _ => AuthError::Malformed(e.to_string()),
            },
        )?;

        Ok(data.claims)
    }
}

/// Cheap structural check: three non-empty base64url segments with a JSON
/// header that names an algorithm.
fn check_shape(token: &str) -> Result<(), AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(AuthError::Malformed(
            "expected three dot-separated segments".to_string(),
        ));
    }

    for segment in &segments {
        if !segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(AuthError::Malformed(
                "segment is not base64url".to_string(),
            ));
        }
    }

    let header = URL_SAFE_NO_PAD
        .decode(segments[0])
        .map_err(|e| AuthError::Malformed(format!("header: {e}")))?;
    let header: serde_json::Value = serde_json::from_slice(&header)
        .map_err(|e| AuthError::Malformed(format!("header: {e}")))?;
    if !header.get("alg").is_some_and(|alg| alg.is_string()) {
        return Err(AuthError::Malformed("header has no alg".to_string()));
    }

    Ok(())
}
