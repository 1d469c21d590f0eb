//! # Errors
//!
//! `StoreError` is what adapters return; services translate it into
//! `DomainError`, which the API layer maps onto HTTP statuses.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by an external collaborator adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The collaborator could not be reached or answered with a transport error.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within its bound.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The collaborator answered but refused the request (e.g. bad mapping, 4xx).
    #[error("rejected: {0}")]
    Rejected(String),

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// The primary error type for service operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// No authenticated identity on a write request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed input (bad number, empty field, bad body).
    #[error("validation error: {0}")]
    Validation(String),

    /// A collaborator on the synchronous path failed.
    #[error("{collaborator} unavailable: {source}")]
    Unavailable {
        collaborator: &'static str,
        #[source]
        source: StoreError,
    },

    /// Encoding a response failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn unavailable(collaborator: &'static str, source: StoreError) -> Self {
        Self::Unavailable {
            collaborator,
            source,
        }
    }
}

/// A specialized Result type for service logic.
pub type Result<T> = std::result::Result<T, DomainError>;

/// Failure issuing or verifying a bearer token.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}
