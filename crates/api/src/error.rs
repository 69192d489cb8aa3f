//! Maps `CoreError`/`MinutesError` onto the status-code table: 400 invalid
//! input, 401 unauthorized, 403 forbidden, 404 not found, 409 ambiguous
//! (with `candidates`) or conflict, 503 upstream unavailable. Same
//! `impl IntoResponse` shape as the reference repo's `error.rs`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use sfuctl_core::error::CoreError;
use sfuctl_minutes::MinutesError;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Ambiguous(Vec<String>),
    InvalidInput(String),
    Conflict(String),
    UpstreamUnavailable(String),
    Transient(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, candidates) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Ambiguous(candidates) => {
                (StatusCode::CONFLICT, "ambiguous room".to_string(), Some(candidates))
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            ApiError::UpstreamUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, None),
            ApiError::Transient(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, None),
        };

        (status, Json(ErrorBody { error: message, candidates })).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unauthorized => ApiError::Unauthorized("unauthorized".into()),
            CoreError::Forbidden(msg) => ApiError::Forbidden(msg),
            CoreError::NotFound(msg) => ApiError::NotFound(msg),
            CoreError::Ambiguous(candidates) => ApiError::Ambiguous(candidates),
            CoreError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            CoreError::Conflict(msg) => ApiError::Conflict(msg),
            CoreError::UpstreamUnavailable(msg) => ApiError::UpstreamUnavailable(msg),
            CoreError::Transient(msg) => ApiError::Transient(msg),
        }
    }
}

impl From<MinutesError> for ApiError {
    fn from(err: MinutesError) -> Self {
        match err {
            MinutesError::NoTranscript => ApiError::NotFound("no transcript available for this room".into()),
            MinutesError::SummarizeFailed(msg) => ApiError::UpstreamUnavailable(msg),
            MinutesError::RenderFailed(msg) => ApiError::UpstreamUnavailable(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::UpstreamUnavailable(err.to_string())
    }
}
