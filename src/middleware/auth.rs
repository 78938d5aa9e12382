//! API key gateway middleware.
//!
//! This middleware intercepts every gated request to:
//! 1. Extract the raw key from the `api_key` header
//! 2. Evaluate the key's plan and quota, charging one unit of usage
//! 3. Inject the resolved key into the request extensions
//! 4. Reject the request with a JSON error before it reaches any handler otherwise

use crate::{
    error::AppError, models::api_key::ApiKeyRecord, services::api_key_service, store::SharedStore,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

/// Header carrying the raw API key. Not an `Authorization` scheme.
pub const API_KEY_HEADER: &str = "api_key";

/// Key that admitted the current request.
///
/// Handlers extract it with `Extension<ApiKeyContext>`. The usage count
/// already includes the current request.
#[derive(Debug, Clone)]
pub struct ApiKeyContext {
    pub key: ApiKeyRecord,
}

/// Read the raw key from the request headers, if any.
pub fn presented_key(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|h| h.to_str().ok())
}

/// Metered API key middleware function.
///
/// # Flow
///
/// 1. Missing header → 401
/// 2. Unknown or inactive key → 403
/// 3. Lapsed paid plan → reverted to free, 403
/// 4. Quota exhausted → 429
/// 5. Otherwise usage is incremented and the next handler runs
pub async fn api_key_middleware(
    State(store): State<SharedStore>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = presented_key(request.headers()).map(str::to_owned);

    let key = api_key_service::admit(store.as_ref(), presented.as_deref(), Utc::now()).await?;

    tracing::debug!(key_id = %key.id, usage = key.usage, limit = key.usage_limit, "request admitted");

    request.extensions_mut().insert(ApiKeyContext { key });

    Ok(next.run(request).await)
}
