//! Metered public endpoints.
//!
//! Everything in this module sits behind the API key gateway.

use crate::{middleware::auth::ApiKeyContext, models::plan::Plan};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Key details as seen by a gated handler.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfoResponse {
    pub success: bool,
    pub key_id: Uuid,
    pub plan: Plan,
    pub usage: i64,
    pub usage_limit: i64,
    pub remaining: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

/// Describe the key that paid for this request.
///
/// # Endpoint
///
/// `GET /api/v1/public/key-info` with the `api_key` header.
pub async fn key_info(Extension(ctx): Extension<ApiKeyContext>) -> Json<KeyInfoResponse> {
    let key = ctx.key;

    Json(KeyInfoResponse {
        success: true,
        key_id: key.id,
        plan: key.plan,
        usage: key.usage,
        usage_limit: key.usage_limit,
        remaining: key.remaining(),
        valid_until: key.valid_until,
    })
}
