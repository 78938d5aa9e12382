//! Data models representing database entities.
//!
//! This module contains the API key record, its plan tiers and the JSON bodies
//! exchanged by the key endpoints.

/// API key record and endpoint bodies
pub mod api_key;
/// Plan tiers, limits and prices
pub mod plan;
