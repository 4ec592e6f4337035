//! Unified error handling for the server.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Engine error: {0}")]
    Engine(#[from] shelf_engine::Error),

    #[error("Invalid request body: {0}")]
    Body(#[from] JsonRejection),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    fn status(&self) -> StatusCode {
        use shelf_engine::Error;

        match self {
            AppError::Engine(Error::InvalidSnapshot(_)) => StatusCode::BAD_REQUEST,
            AppError::Engine(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Engine(Error::DuplicateEntity(_))
            | AppError::Engine(Error::ReferentialConstraint(_)) => StatusCode::CONFLICT,
            AppError::Engine(Error::Unexpected(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Body(rejection) => rejection.status(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_message, details) = match &self {
            AppError::Engine(shelf_engine::Error::Unexpected(msg)) => {
                tracing::error!("Store error: {}", msg);
                ("Internal server error".to_string(), None)
            }
            AppError::Engine(e @ shelf_engine::Error::InvalidSnapshot(_)) => {
                tracing::debug!("Rejected snapshot: {}", e);
                ("Invalid snapshot".to_string(), Some(e.to_string()))
            }
            AppError::Engine(e) => {
                tracing::warn!("Engine error: {:?}", e);
                (e.to_string(), None)
            }
            AppError::Body(rejection) => ("Invalid request body".to_string(), Some(rejection.body_text())),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
