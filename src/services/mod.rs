//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.

pub mod api_key_service;
pub mod quota;
