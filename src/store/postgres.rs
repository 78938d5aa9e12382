//! PostgreSQL key store.

use super::{ApiKeyStore, StoreBackend, StoreError};
use crate::{db::DbPool, models::api_key::ApiKeyRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const COLUMNS: &str = "id, secret, secret_hash, owner_email, usage, usage_limit, last_reset, \
                       valid_until, plan, price_paid, active, created_at, updated_at";

/// Key store backed by the `api_keys` table.
#[derive(Debug, Clone)]
pub struct PgApiKeyStore {
    pool: DbPool,
}

impl PgApiKeyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for PgApiKeyStore {
    async fn find_active_by_hash(
        &self,
        secret_hash: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        let record = sqlx::query_as::<_, ApiKeyRecord>(&format!(
            "SELECT {COLUMNS} FROM api_keys WHERE secret_hash = $1 AND active = true"
        ))
        .bind(secret_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_active_by_owner(
        &self,
        owner_email: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        let record = sqlx::query_as::<_, ApiKeyRecord>(&format!(
            "SELECT {COLUMNS} FROM api_keys
             WHERE owner_email = $1 AND active = true
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(owner_email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert(&self, record: &ApiKeyRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (
                id, secret, secret_hash, owner_email, usage, usage_limit, last_reset,
                valid_until, plan, price_paid, active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(record.id)
        .bind(&record.secret)
        .bind(&record.secret_hash)
        .bind(&record.owner_email)
        .bind(record.usage)
        .bind(record.usage_limit)
        .bind(record.last_reset)
        .bind(record.valid_until)
        .bind(record.plan.as_str())
        .bind(record.price_paid)
        .bind(record.active)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save(&self, record: &ApiKeyRecord) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE api_keys
            SET secret = $2,
                secret_hash = $3,
                usage = $4,
                usage_limit = $5,
                last_reset = $6,
                valid_until = $7,
                plan = $8,
                price_paid = $9,
                active = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.secret)
        .bind(&record.secret_hash)
        .bind(record.usage)
        .bind(record.usage_limit)
        .bind(record.last_reset)
        .bind(record.valid_until)
        .bind(record.plan.as_str())
        .bind(record.price_paid)
        .bind(record.active)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::NotFound(record.id));
        }

        Ok(())
    }

    async fn increment_usage(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        // Single statement: the WHERE clause is the quota gate.
        let record = sqlx::query_as::<_, ApiKeyRecord>(&format!(
            "UPDATE api_keys
             SET usage = usage + 1, updated_at = $2
             WHERE id = $1 AND active = true AND usage < usage_limit
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Postgres
    }
}
