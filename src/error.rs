//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Errors surfaced by the HTTP handlers
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing query parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid document location: {0}")]
    InvalidLocation(String),

    #[error("Document could not be loaded: {0}")]
    DocumentUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingParameter(_) | AppError::InvalidLocation(_) => StatusCode::BAD_REQUEST,
            AppError::DocumentUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = match &self {
            AppError::MissingParameter(_) => "MISSING_PARAMETER",
            AppError::InvalidLocation(_) => "INVALID_LOCATION",
            AppError::DocumentUnavailable(_) => "DOCUMENT_UNAVAILABLE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        };

        if let AppError::Internal(message) = &self {
            tracing::error!("{}", message);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
