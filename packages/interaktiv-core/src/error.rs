//! Centralized error types for the Interaktiv core library.
//!
//! - Structured error types using `thiserror`
//! - Mapping to HTTP status codes
//! - `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::broadcast::BroadcastError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for BroadcastError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "broadcast_unavailable",
            Self::Unauthorized => "broadcast_unauthorized",
            Self::Protocol(_) => "broadcast_protocol_error",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::ShuttingDown => "broadcast_shutting_down",
        }
    }
}

/// Application-wide error type for the Interaktiv server.
#[derive(Debug, Error)]
pub enum InteraktivError {
    /// Client sent an invalid or malformed request.
    #[error("{0}")]
    InvalidRequest(String),

    /// The request referenced a participant that never registered a nickname.
    #[error("{0}")]
    UnknownUser(String),

    /// Publishing to, or subscribing at, the broadcast service failed.
    #[error("Broadcast failed: {0}")]
    Broadcast(#[from] BroadcastError),

    /// Server configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InteraktivError {
    /// Shorthand for the generic validation failure.
    pub fn validation() -> Self {
        Self::InvalidRequest("Validation error".to_string())
    }

    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnknownUser(_) => "unknown_user",
            // Payload problems are ours, not the broadcaster's.
            Self::Broadcast(BroadcastError::InvalidPayload(_)) => "internal_error",
            Self::Broadcast(_) => "broadcast_unavailable",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::UnknownUser(_) => StatusCode::BAD_REQUEST,
            Self::Broadcast(BroadcastError::InvalidPayload(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Broadcast(_) | Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type InteraktivResult<T> = Result<T, InteraktivError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    error: &'static str,
    message: String,
}

impl IntoResponse for InteraktivError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            let detail = match &self {
                Self::Broadcast(e) => e.code(),
                other => other.code(),
            };
            log::warn!("[HTTP] {} ({})", self, detail);
        }
        let body = ErrorResponse {
            status: "error",
            error: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
