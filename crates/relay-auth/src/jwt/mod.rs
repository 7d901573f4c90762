//! JWT token encoding, decoding, and claims management.

pub mod claims;
pub mod decoder;
pub mod encoder;

pub use claims::TokenClaims;
pub use decoder::JwtDecoder;
pub use encoder::{IssuedToken, JwtEncoder};
