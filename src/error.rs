//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use crate::services::quota::Rejection;
use crate::store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Gateway Rejections**: the quota evaluator refused a gated request
/// - **Storage Errors**: the key store failed
/// - **Administrative Errors**: bad input, unknown plan or missing key on the owner endpoints
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Gated request refused by the quota evaluator.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// Key store operation failed (connection error, query error, conflict).
    ///
    /// Returns HTTP 500 and hides the details from the client.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Required request data is absent.
    ///
    /// Returns HTTP 400 Bad Request with the contained message.
    #[error("{0}")]
    InvalidInput(&'static str),

    /// Request body could not be read or is not valid JSON for the endpoint.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid JSON body: {0}")]
    MalformedBody(String),

    /// Upgrade target is not one of the paid plans.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid plan")]
    InvalidPlan,

    /// No active key matches the given email or secret.
    ///
    /// Returns HTTP 404 Not Found with the contained message.
    #[error("{0}")]
    KeyNotFound(&'static str),
}

impl AppError {
    pub fn key_not_found_for_email() -> Self {
        AppError::KeyNotFound("API key not found for this email")
    }

    pub fn key_not_found() -> Self {
        AppError::KeyNotFound("API key not found")
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Rejected(rejection) => rejection.status(),
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidInput(_) | AppError::MalformedBody(_) | AppError::InvalidPlan => {
                StatusCode::BAD_REQUEST
            }
            AppError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "success": false,
///   "message": "Human-readable error message"
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::Store(err) => {
                tracing::error!(error = %err, "key store failure");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "message": message
        }));

        (status, body).into_response()
    }
}
