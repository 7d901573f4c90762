//! # relay-core
//!
//! Core crate for the relay. Contains configuration schemas, typed
//! identifiers, the wire message envelope, identity claims, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other relay crates.

pub mod config;
pub mod error;
pub mod protocol;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
