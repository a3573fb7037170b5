//! HTTP-edge error type

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::import::{ImportError, StoreError};
use crate::queue::QueueError;

/// Result type alias for handlers
pub type ApiResult<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Invalid request: {0}")]
    Bizsync(#[from] bizsync_common::BizsyncError),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::BadRequest(_) | AppError::Bizsync(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            },
            AppError::Import(e) => {
                let status = match e {
                    ImportError::Validation(_)
                    | ImportError::EmptyInput(_)
                    | ImportError::Read(_)
                    | ImportError::Csv(_) => StatusCode::BAD_REQUEST,
                    ImportError::NothingToMerge { .. } => StatusCode::NOT_FOUND,
                    ImportError::AmbiguousMatch { .. } => StatusCode::CONFLICT,
                    ImportError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
                    ImportError::Pattern(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.kind())
            },
            AppError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_ERROR"),
            AppError::Queue(_) => (StatusCode::INTERNAL_SERVER_ERROR, "QUEUE_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "The company store is unavailable".to_string(),
                _ => "An internal error occurred".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = match &self {
            AppError::Import(ImportError::AmbiguousMatch { count, .. }) => {
                ErrorResponse::with_details(code, message, json!({ "candidates": count }))
            },
            _ => ErrorResponse::new(code, message),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_import_errors_map_to_codes() {
        let cases = [
            (
                AppError::from(ImportError::Validation("zip is required".into())),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                AppError::from(ImportError::nothing_to_merge("Foo", Some("12345"))),
                StatusCode::NOT_FOUND,
                "NOTHING_TO_MERGE",
            ),
            (
                AppError::from(ImportError::ambiguous("Foo", None, 3)),
                StatusCode::CONFLICT,
                "AMBIGUOUS_MATCH",
            ),
            (
                AppError::from(ImportError::Store(StoreError::Unavailable("down".into()))),
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_ERROR",
            ),
        ];

        for (error, status, code) in cases {
            assert_eq!(error.status_and_code(), (status, code));
        }
    }

    #[test]
    fn test_server_errors_hide_details() {
        let response =
            AppError::from(StoreError::Unavailable("secret host".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
