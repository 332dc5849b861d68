//! Share lifecycle errors and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Failures of session lifecycle operations.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("{0}")]
    Validation(String),
    #[error("File does not exist: {0}")]
    NotFound(String),
    #[error("File not found.")]
    FileMissing,
    #[error("Another sharing session is already in progress")]
    Conflict,
    #[error("No active sharing session")]
    NoActiveSession,
    #[error("Confirmation required")]
    NotConfirmed,
    #[error("Tunnel provider failed: {0:#}")]
    Provider(anyhow::Error),
    #[error("Failed to encode share link: {0:#}")]
    Link(anyhow::Error),
    #[error("Error streaming the file: {0}")]
    Stream(#[from] std::io::Error),
}

/// Errors returned from HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadGateway(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::BadGateway(_) => (StatusCode::BAD_GATEWAY, "bad_gateway"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl From<ShareError> for AppError {
    fn from(err: ShareError) -> Self {
        let message = err.to_string();
        match err {
            ShareError::Validation(_) | ShareError::NoActiveSession => {
                AppError::BadRequest(message)
            }
            ShareError::NotFound(_) | ShareError::FileMissing => AppError::NotFound(message),
            ShareError::Conflict => AppError::Conflict(message),
            ShareError::NotConfirmed => AppError::Forbidden(message),
            ShareError::Provider(_) => AppError::BadGateway(message),
            ShareError::Link(e) => AppError::Internal(e.context("Failed to start sharing")),
            ShareError::Stream(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_type();

        // never leak internal error chains to remote callers
        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "message": message,
            "error": {
                "type": kind,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}
