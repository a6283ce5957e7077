//! JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AppError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// An error rendered as `{ "error": <code>, "message": <text> }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn order_not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "order_not_found",
            "Order not found. Check the link from your email.",
        )
    }

    pub fn link_expired() -> Self {
        Self::new(
            StatusCode::GONE,
            "link_expired",
            "This download link has expired.",
        )
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        if err.is_client_error() {
            log::debug!("Request rejected: {}", err);
        }
        match err {
            AppError::Validation(message) => {
                Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
            }
            AppError::NotFound(message) => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            AppError::Conflict(message) => Self::new(StatusCode::CONFLICT, "conflict", message),
            other => {
                log::error!("Request failed: {}", other);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::validation("bad"), StatusCode::BAD_REQUEST, "validation_error"),
            (AppError::not_found("x"), StatusCode::NOT_FOUND, "not_found"),
            (AppError::conflict("x"), StatusCode::CONFLICT, "conflict"),
            (AppError::storage("disk"), StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        ];

        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status, status);
            assert_eq!(api.code, code);
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let api = ApiError::from(AppError::storage("/var/secret/path is full"));
        assert_eq!(api.message, "Internal server error");
    }
}
