//! Error types for the vitals API

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use vitals_core::VitalsError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid metric: {0}")]
    InvalidMetric(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg.clone())
            }
            ApiError::InvalidMetric(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_METRIC", msg.clone())
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<VitalsError> for ApiError {
    fn from(err: VitalsError) -> Self {
        match err {
            VitalsError::InvalidMetric(msg) => ApiError::InvalidMetric(msg),
            VitalsError::InvalidRating(rating) => {
                ApiError::InvalidMetric(format!("unknown rating '{}'", rating))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// Malformed bodies are a client error, whatever axum's default status
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}
