//! Error types for fintrack-api

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fintrack_core::CoreError;
use fintrack_store::StoreError;
use thiserror::Error;

/// HTTP-facing error; every variant maps to a status and a JSON body
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Upstream error: {message}")]
    Upstream { message: String },

    #[error("Internal server error")]
    InternalError,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Conflict { .. } => "CONFLICT",
            ApiError::Upstream { .. } => "UPSTREAM_ERROR",
            ApiError::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("request failed: {self}");
        }
        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Validation { message } => ApiError::BadRequest { message },
            CoreError::NotFound { resource } => ApiError::NotFound { resource },
            CoreError::Conflict { message } => ApiError::Conflict { message },
            CoreError::Unauthorized => ApiError::Unauthorized,
            CoreError::Upstream { message } => ApiError::Upstream { message },
            CoreError::Store(e) => {
                log::error!("storage error: {e}");
                ApiError::InternalError
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        ApiError::from(CoreError::from(error))
    }
}
