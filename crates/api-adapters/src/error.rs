//! HTTP error responses.
//!
//! Every failure leaves the API as `{"code": "...", "message": "..."}` with
//! the status chosen here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Unauthorized(msg) => {
                Self::new(StatusCode::BAD_REQUEST, "unauthorized", msg)
            }
            DomainError::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, "validation", msg),
            DomainError::Unavailable {
                collaborator,
                source,
            } => {
                // Store details stay in the logs.
                tracing::error!(collaborator, error = %source, "collaborator failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "unavailable",
                    format!("{collaborator} unavailable"),
                )
            }
            DomainError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                Self::internal("internal error")
            }
        }
    }
}

/// Problems reading the `/post` multipart form.
#[derive(Error, Debug)]
pub enum FormError {
    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("missing form field `{0}`")]
    Missing(&'static str),

    #[error("form field `{field}` is not a number: {value:?}")]
    NotANumber { field: &'static str, value: String },
}

impl From<FormError> for ApiError {
    fn from(err: FormError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", err.to_string())
    }
}
