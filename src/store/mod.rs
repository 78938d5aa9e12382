//! Persistence of API key records.
//!
//! The gateway talks to storage only through [`ApiKeyStore`]. PostgreSQL is the
//! production backend; the in-memory backend serves local runs without a
//! database and the test suite.

use crate::models::api_key::ApiKeyRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryApiKeyStore;
pub use postgres::PgApiKeyStore;

/// Store handle shared with every handler through axum `State`.
pub type SharedStore = Arc<dyn ApiKeyStore>;

/// Which backend holds the keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    /// Value reported in the `database` field of `/health`.
    pub fn status(self) -> &'static str {
        match self {
            StoreBackend::Postgres => "connected",
            StoreBackend::Memory => "memory",
        }
    }
}

/// Errors raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique column (`secret`, `secret_hash`) already holds this value.
    #[error("duplicate value for {0}")]
    Conflict(String),

    #[error("api key {0} does not exist")]
    NotFound(Uuid),
}

/// Storage operations needed by the gateway and the owner endpoints.
#[async_trait]
pub trait ApiKeyStore: Send + Sync + Debug {
    /// Active key whose secret hashes to `secret_hash`.
    async fn find_active_by_hash(
        &self,
        secret_hash: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// Most recently created active key of an owner.
    async fn find_active_by_owner(
        &self,
        owner_email: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// Persist a newly issued key.
    async fn insert(&self, record: &ApiKeyRecord) -> Result<(), StoreError>;

    /// Overwrite every mutable column of an existing key.
    async fn save(&self, record: &ApiKeyRecord) -> Result<(), StoreError>;

    /// Spend one unit of quota if the key is still below its limit.
    ///
    /// The check and the increment happen as one step, so concurrent requests
    /// cannot push `usage` past `usage_limit`. Returns the updated record, or
    /// `None` when the limit was already reached.
    async fn increment_usage(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// Connectivity check for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;

    fn backend(&self) -> StoreBackend;
}
