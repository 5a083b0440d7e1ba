//! Transmission API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use transmission_core::error::DomainError;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The match configuration was rejected.
    #[error("match configuration rejected: {0}")]
    Domain(#[from] DomainError),

    /// The tracing pipeline could not be set up.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP status and machine-readable code for a domain error. Shared by the
/// REST routes and WebSocket replies.
#[must_use]
pub fn classify(err: &DomainError) -> (StatusCode, &'static str) {
    match err {
        DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        DomainError::DuplicateId(_) => (StatusCode::CONFLICT, "duplicate_id"),
        DomainError::TeamFull { .. } => (StatusCode::CONFLICT, "team_full"),
        DomainError::AlreadySeated { .. } => (StatusCode::CONFLICT, "already_seated"),
        DomainError::AlreadyEnded => (StatusCode::CONFLICT, "already_ended"),
        DomainError::NotStarted => (StatusCode::CONFLICT, "not_started"),
        DomainError::ForbiddenRole(_) => (StatusCode::FORBIDDEN, "forbidden_role"),
        DomainError::NotParticipant(_) => (StatusCode::FORBIDDEN, "not_participant"),
        DomainError::OutOfRange { .. } => (StatusCode::BAD_REQUEST, "out_of_range"),
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        DomainError::PipelineFailed(_) => (StatusCode::BAD_GATEWAY, "pipeline_failed"),
    }
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = classify(&self.0);

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
