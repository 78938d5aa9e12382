//! Health check endpoint for service monitoring.

use crate::{error::AppError, store::SharedStore};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
///
/// Returns service status and key store connectivity.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Key store backend: `connected` for PostgreSQL, `memory` for the in-process store
    pub database: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// Without `DATABASE_URL` the service runs on the in-memory store and reports
/// `"database": "memory"`:
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "memory",
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// # Response (500 Internal Server Error)
///
/// If the store is unreachable, returns the standard error response.
pub async fn health_check(
    State(store): State<SharedStore>,
) -> Result<Json<HealthResponse>, AppError> {
    store.ping().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        database: store.backend().status().to_string(),
        timestamp: Utc::now(),
    }))
}
