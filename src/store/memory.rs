//! In-memory key store.
//!
//! Used when no `DATABASE_URL` is configured and by the test suite. Data lives
//! for the lifetime of the process.

use super::{ApiKeyStore, StoreBackend, StoreError};
use crate::models::api_key::ApiKeyRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryApiKeyStore {
    keys: RwLock<HashMap<Uuid, ApiKeyRecord>>,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a key by id, active or not.
    #[cfg(test)]
    pub async fn get(&self, id: Uuid) -> Option<ApiKeyRecord> {
        self.keys.read().await.get(&id).cloned()
    }
}

/// Reject `record` if another key already owns its secret or hash.
fn check_unique(
    keys: &HashMap<Uuid, ApiKeyRecord>,
    record: &ApiKeyRecord,
) -> Result<(), StoreError> {
    for other in keys.values().filter(|other| other.id != record.id) {
        if other.secret_hash == record.secret_hash {
            return Err(StoreError::Conflict("secret_hash".into()));
        }
        if other.secret == record.secret {
            return Err(StoreError::Conflict("secret".into()));
        }
    }
    Ok(())
}

#[async_trait]
impl ApiKeyStore for InMemoryApiKeyStore {
    async fn find_active_by_hash(
        &self,
        secret_hash: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        let keys = self.keys.read().await;
        Ok(keys
            .values()
            .find(|key| key.active && key.secret_hash == secret_hash)
            .cloned())
    }

    async fn find_active_by_owner(
        &self,
        owner_email: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        let keys = self.keys.read().await;
        Ok(keys
            .values()
            .filter(|key| key.active && key.owner_email == owner_email)
            .max_by_key(|key| key.created_at)
            .cloned())
    }

    async fn insert(&self, record: &ApiKeyRecord) -> Result<(), StoreError> {
        let mut keys = self.keys.write().await;

        if keys.contains_key(&record.id) {
            return Err(StoreError::Conflict("id".into()));
        }
        check_unique(&keys, record)?;

        keys.insert(record.id, record.clone());
        Ok(())
    }

    async fn save(&self, record: &ApiKeyRecord) -> Result<(), StoreError> {
        let mut keys = self.keys.write().await;

        if !keys.contains_key(&record.id) {
            return Err(StoreError::NotFound(record.id));
        }
        check_unique(&keys, record)?;

        keys.insert(record.id, record.clone());
        Ok(())
    }

    async fn increment_usage(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        let mut keys = self.keys.write().await;

        let Some(key) = keys.get_mut(&id) else {
            return Ok(None);
        };
        if !key.active || key.usage >= key.usage_limit {
            return Ok(None);
        }

        key.usage += 1;
        key.updated_at = now;
        Ok(Some(key.clone()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(email: &str, secret: &str, now: DateTime<Utc>) -> ApiKeyRecord {
        ApiKeyRecord::issue(email, secret.into(), format!("hash-{secret}"), now)
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_hash() {
        let store = InMemoryApiKeyStore::new();
        let now = Utc::now();
        store.insert(&key("a@x.com", "one", now)).await.unwrap();

        let err = store.insert(&key("b@x.com", "one", now)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_find_by_owner_skips_inactive_and_prefers_newest() {
        let store = InMemoryApiKeyStore::new();
        let now = Utc::now();

        let old = key("a@x.com", "old", now - chrono::Duration::days(2));
        let newer = key("a@x.com", "newer", now - chrono::Duration::days(1));
        let mut revoked = key("a@x.com", "revoked", now);
        revoked.active = false;

        for record in [&old, &newer, &revoked] {
            store.insert(record).await.unwrap();
        }

        let found = store.find_active_by_owner("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, newer.id);
        assert!(store.find_active_by_owner("z@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_hash_ignores_inactive() {
        let store = InMemoryApiKeyStore::new();
        let mut record = key("a@x.com", "s", Utc::now());
        record.active = false;
        store.insert(&record).await.unwrap();

        assert!(store.find_active_by_hash("hash-s").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_stops_at_limit() {
        let store = InMemoryApiKeyStore::new();
        let now = Utc::now();
        let mut record = key("a@x.com", "s", now);
        record.usage = 99;
        store.insert(&record).await.unwrap();

        let bumped = store.increment_usage(record.id, now).await.unwrap().unwrap();
        assert_eq!(bumped.usage, 100);
        assert!(store.increment_usage(record.id, now).await.unwrap().is_none());
        assert_eq!(store.get(record.id).await.unwrap().usage, 100);
    }

    #[tokio::test]
    async fn test_save_unknown_key() {
        let store = InMemoryApiKeyStore::new();
        let record = key("a@x.com", "s", Utc::now());

        let err = store.save(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == record.id));
    }
}
