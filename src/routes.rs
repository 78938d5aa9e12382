//! HTTP router assembly.
//!
//! Owner endpoints and the health check are open; everything under
//! `/api/v1/public` passes through the metered API key gateway.

use crate::{handlers, middleware, store::SharedStore};
use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the application router around a key store.
pub fn app(store: SharedStore) -> Router {
    // Metered routes
    let gated_routes = Router::new()
        .route("/api/v1/public/key-info", get(handlers::public::key_info))
        // Only matched routes are metered; unknown paths stay 404
        .route_layer(axum_middleware::from_fn_with_state(
            store.clone(),
            middleware::auth::api_key_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        // Key management routes
        .route("/api/v1/keys/register", post(handlers::api_keys::register))
        .route("/api/v1/keys/dashboard", get(handlers::api_keys::dashboard))
        .route(
            "/api/v1/keys/regenerate",
            post(handlers::api_keys::regenerate),
        )
        .route("/api/v1/keys/usage", get(handlers::api_keys::usage))
        .route("/api/v1/keys/upgrade", post(handlers::api_keys::upgrade))
        .merge(gated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plan::Plan;
    use crate::store::{ApiKeyStore, InMemoryApiKeyStore};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn setup() -> (Arc<InMemoryApiKeyStore>, Router) {
        let store = Arc::new(InMemoryApiKeyStore::new());
        let router = app(store.clone());
        (store, router)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn gated(uri: &str, key: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("api_key", key)
            .body(Body::empty())
            .unwrap()
    }

    async fn register(router: &Router, email: &str) -> String {
        let (status, body) = send(
            router,
            post_json("/api/v1/keys/register", json!({ "email": email })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["apiKey"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (_, router) = setup();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "memory");
    }

    #[tokio::test]
    async fn test_register_and_dashboard() {
        let (_, router) = setup();

        let (status, body) = send(
            &router,
            post_json("/api/v1/keys/register", json!({ "email": "a@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["usageLimit"], 100);
        let secret = body["apiKey"].as_str().unwrap().to_string();

        let request = Request::builder()
            .uri("/api/v1/keys/dashboard?email=a@x.com")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["apiKey"], secret.as_str());
        assert_eq!(body["plan"], "free");
        assert_eq!(body["usage"], 0);
        assert_eq!(body["remaining"], 100);
    }

    #[tokio::test]
    async fn test_register_without_email() {
        let (_, router) = setup();
        let (status, body) = send(&router, post_json("/api/v1/keys/register", json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "success": false, "message": "Email required" }));
    }

    #[tokio::test]
    async fn test_owner_endpoints_without_body() {
        let (_, router) = setup();

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/keys/register")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "success": false, "message": "Email required" }));

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/keys/upgrade")
            .header("api_key", "whatever")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "success": false, "message": "API key and plan required" })
        );
    }

    #[tokio::test]
    async fn test_owner_endpoints_reject_malformed_json() {
        let (_, router) = setup();

        let requests = [
            ("/api/v1/keys/register", "not json"),
            ("/api/v1/keys/register", r#"{"email":5}"#),
            ("/api/v1/keys/regenerate", r#"{"email":"#),
            ("/api/v1/keys/upgrade", r#"["100k"]"#),
        ];

        for (uri, raw) in requests {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(raw))
                .unwrap();
            let (status, body) = send(&router, request).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {raw}");
            assert_eq!(body["success"], false);
            assert!(
                body["message"]
                    .as_str()
                    .unwrap()
                    .starts_with("Invalid JSON body"),
                "{body}"
            );
        }
    }

    #[tokio::test]
    async fn test_dashboard_unknown_owner() {
        let (_, router) = setup();
        let request = Request::builder()
            .uri("/api/v1/keys/dashboard?email=nobody@x.com")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "API key not found for this email");
    }

    #[tokio::test]
    async fn test_gateway_missing_and_unknown_key() {
        let (_, router) = setup();

        let request = Request::builder()
            .uri("/api/v1/public/key-info")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            json!({ "success": false, "message": "API key required in header" })
        );

        let (status, body) = send(&router, gated("/api/v1/public/key-info", "bogus")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Invalid or inactive API key");
    }

    #[tokio::test]
    async fn test_gateway_meters_requests() {
        let (store, router) = setup();
        let secret = register(&router, "a@x.com").await;

        let (status, body) = send(&router, gated("/api/v1/public/key-info", &secret)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["usage"], 1);
        assert_eq!(body["remaining"], 99);

        // Push the key to its last unit.
        let mut record = store.find_active_by_owner("a@x.com").await.unwrap().unwrap();
        record.usage = 99;
        store.save(&record).await.unwrap();

        let (status, body) = send(&router, gated("/api/v1/public/key-info", &secret)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["usage"], 100);

        let (status, body) = send(&router, gated("/api/v1/public/key-info", &secret)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body["message"],
            "API usage limit reached. Please wait for daily reset."
        );
    }

    #[tokio::test]
    async fn test_usage_endpoint_does_not_spend() {
        let (_, router) = setup();
        let secret = register(&router, "a@x.com").await;

        for _ in 0..2 {
            let (status, body) = send(&router, gated("/api/v1/keys/usage", &secret)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["usage"], 0);
            assert_eq!(body["plan"], "free");
        }

        let request = Request::builder()
            .uri("/api/v1/keys/usage")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upgrade_then_expiry() {
        let (store, router) = setup();
        let secret = register(&router, "a@x.com").await;

        let mut request = post_json("/api/v1/keys/upgrade", json!({ "plan": "100k" }));
        request
            .headers_mut()
            .insert("api_key", secret.parse().unwrap());
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Upgraded to 100k plan");
        assert_eq!(body["usageLimit"], 100_000);
        assert_eq!(body["pricePaid"], 300);
        assert!(body["validUntil"].is_string());

        // Let the plan lapse.
        let mut record = store.find_active_by_owner("a@x.com").await.unwrap().unwrap();
        assert_eq!(record.plan, Plan::Paid100K);
        record.valid_until = Some(Utc::now() - Duration::seconds(1));
        store.save(&record).await.unwrap();

        let (status, body) = send(&router, gated("/api/v1/public/key-info", &secret)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Plan expired. Please renew.");

        let (status, body) = send(&router, gated("/api/v1/public/key-info", &secret)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["plan"], "free");
        assert_eq!(body["usage"], 1);
        assert_eq!(body["usageLimit"], 100);
    }

    #[tokio::test]
    async fn test_upgrade_invalid_plan() {
        let (_, router) = setup();
        let secret = register(&router, "a@x.com").await;

        let mut request = post_json("/api/v1/keys/upgrade", json!({ "plan": "50k" }));
        request
            .headers_mut()
            .insert("api_key", secret.parse().unwrap());
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid plan");

        let (status, body) = send(
            &router,
            post_json("/api/v1/keys/upgrade", json!({ "plan": "1m" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "API key and plan required");
    }

    #[tokio::test]
    async fn test_regenerate_rotates_secret() {
        let (_, router) = setup();
        let old = register(&router, "a@x.com").await;

        let (status, body) = send(
            &router,
            post_json("/api/v1/keys/regenerate", json!({ "email": "a@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let new = body["apiKey"].as_str().unwrap().to_string();
        assert_ne!(new, old);

        let (status, _) = send(&router, gated("/api/v1/public/key-info", &old)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&router, gated("/api/v1/public/key-info", &new)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
