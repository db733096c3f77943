//! HTTP response helper functions for consistent API responses.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

/// Standard API success response with JSON data.
pub fn api_success<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(data))
}

/// Acknowledges a write with `{ "status": "success", "message": ... }`.
pub fn api_ok(message: impl std::fmt::Display) -> impl IntoResponse {
    api_success(json!({
        "status": "success",
        "message": message.to_string()
    }))
}

/// Lookup miss. Answered with 200 so the frontend can poll without error
/// handling.
pub fn api_warning(message: impl std::fmt::Display) -> impl IntoResponse {
    api_success(json!({ "warning": message.to_string() }))
}
