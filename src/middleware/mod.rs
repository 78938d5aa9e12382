//! HTTP middleware components.
//!
//! Middleware run before route handlers and may short-circuit a request.

/// Metered API key gateway
pub mod auth;
