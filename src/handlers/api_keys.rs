//! Owner-facing API key HTTP handlers.
//!
//! This module implements the key management endpoints:
//! - POST /api/v1/keys/register - Issue a free-plan key
//! - GET /api/v1/keys/dashboard - Show an owner's key and counters
//! - POST /api/v1/keys/regenerate - Replace an owner's secret
//! - GET /api/v1/keys/usage - Counters of the key in the `api_key` header
//! - POST /api/v1/keys/upgrade - Move the key in the `api_key` header to a paid plan
//!
//! None of these routes are metered. Bodies are read with `JsonBody`, so an
//! empty body is treated as `{}`.

use crate::{
    error::AppError,
    extract::JsonBody,
    middleware::auth::presented_key,
    models::api_key::{
        DashboardResponse, IssuedKeyResponse, OwnerQuery, OwnerRequest, UpgradeRequest,
        UpgradeResponse, UsageResponse,
    },
    services::api_key_service,
    store::SharedStore,
};
use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use chrono::Utc;

/// Register a new API key.
///
/// # Request Body
///
/// ```json
/// { "email": "owner@example.com" }
/// ```
///
/// # Response
///
/// The secret is only returned here and by regenerate.
///
/// ```json
/// { "success": true, "apiKey": "9f86d0...", "usageLimit": 100 }
/// ```
pub async fn register(
    State(store): State<SharedStore>,
    JsonBody(request): JsonBody<OwnerRequest>,
) -> Result<Json<IssuedKeyResponse>, AppError> {
    let record =
        api_key_service::register(store.as_ref(), request.email.as_deref(), Utc::now()).await?;

    Ok(Json(IssuedKeyResponse {
        success: true,
        usage_limit: record.usage_limit,
        api_key: record.secret,
    }))
}

/// Owner dashboard.
///
/// # Endpoint
///
/// `GET /api/v1/keys/dashboard?email=owner@example.com`
///
/// # Response
///
/// ```json
/// {
///   "success": true,
///   "apiKey": "9f86d0...",
///   "usage": 12,
///   "usageLimit": 100,
///   "remaining": 88,
///   "plan": "free",
///   "resetDate": "2025-12-20T10:00:00Z"
/// }
/// ```
///
/// `validUntil` is included for paid plans.
pub async fn dashboard(
    State(store): State<SharedStore>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<DashboardResponse>, AppError> {
    let record = api_key_service::lookup_by_owner(store.as_ref(), query.email.as_deref()).await?;

    Ok(Json(record.into()))
}

/// Issue a new secret for the owner's active key.
///
/// Usage restarts at zero; the plan and its validity are unchanged.
pub async fn regenerate(
    State(store): State<SharedStore>,
    JsonBody(request): JsonBody<OwnerRequest>,
) -> Result<Json<IssuedKeyResponse>, AppError> {
    let record =
        api_key_service::regenerate(store.as_ref(), request.email.as_deref(), Utc::now()).await?;

    Ok(Json(IssuedKeyResponse {
        success: true,
        usage_limit: record.usage_limit,
        api_key: record.secret,
    }))
}

/// Current counters of the presented key. Does not spend quota.
pub async fn usage(
    State(store): State<SharedStore>,
    headers: HeaderMap,
) -> Result<Json<UsageResponse>, AppError> {
    let record =
        api_key_service::usage(store.as_ref(), presented_key(&headers), Utc::now()).await?;

    Ok(Json(UsageResponse::from(&record)))
}

/// Upgrade the presented key.
///
/// # Request Body
///
/// ```json
/// { "plan": "100k" }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "success": true,
///   "message": "Upgraded to 100k plan",
///   "usageLimit": 100000,
///   "validUntil": "2026-01-19T10:00:00Z",
///   "pricePaid": 300
/// }
/// ```
pub async fn upgrade(
    State(store): State<SharedStore>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<UpgradeRequest>,
) -> Result<Json<UpgradeResponse>, AppError> {
    let record = api_key_service::upgrade(
        store.as_ref(),
        presented_key(&headers),
        request.plan.as_deref(),
        Utc::now(),
    )
    .await?;

    Ok(Json(UpgradeResponse::from(&record)))
}
