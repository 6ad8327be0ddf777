use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::client::BackendError;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::NoSession | BackendError::Unauthorized => {
                ApiError::Unauthorized(value.to_string())
            }
            BackendError::Upstream(status) => {
                error!("backend returned {status}");
                ApiError::Internal("College backend request failed".into())
            }
            BackendError::Http(err) => {
                error!("HTTP error: {err}");
                ApiError::Internal("Failed to reach college backend".into())
            }
        }
    }
}
