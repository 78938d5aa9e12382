//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, query, headers)
//! 2. Delegates to the API key service
//! 3. Returns HTTP response (JSON, status code)

/// Owner-facing key management endpoints
pub mod api_keys;
pub mod health;
/// Endpoints behind the metered gateway
pub mod public;
