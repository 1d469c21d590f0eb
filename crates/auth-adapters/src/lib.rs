//! around/crates/auth-adapters/src/lib.rs
//!
//! Bearer token implementations of `TokenService`.

#[cfg(feature = "auth-jwt")]
pub mod jwt;

#[cfg(feature = "auth-jwt")]
pub use jwt::JwtTokenService;

use thiserror::Error;

/// Construction errors for token services.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("token secret must not be empty")]
    EmptySecret,

    #[error("token validity must be positive, got {0}s")]
    InvalidValidity(i64),
}
