//! Maps domain errors onto HTTP responses for the admin API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use sv_common::AlertingError;
use sv_store::StoreError;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub enum ApiError {
    NotFound,
    Forbidden(String),
    Conflict(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", "not found".to_string()),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, "FORBIDDEN", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "CONFLICT", message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

impl From<AlertingError> for ApiError {
    fn from(err: AlertingError) -> Self {
        match err {
            AlertingError::NotFound => ApiError::NotFound,
            AlertingError::Forbidden(message) => ApiError::Forbidden(message),
            AlertingError::Conflict(message) => ApiError::Conflict(message),
            AlertingError::Config(message) => ApiError::BadRequest(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
