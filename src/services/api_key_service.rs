//! API key service - issuing keys and metering gated requests.
//!
//! This service handles:
//! - Secret generation and hashing
//! - Admission of gated requests (quota evaluation + usage increment)
//! - Owner operations: register, dashboard lookup, usage, regenerate, upgrade
//!
//! Every operation takes the current time as an argument so the period rules
//! can be exercised deterministically.

use crate::{
    error::AppError,
    models::{api_key::ApiKeyRecord, plan::Plan},
    services::quota::{self, Evaluation, QuotaWindow, Rejection},
    store::ApiKeyStore,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Generate a cryptographically secure secret.
///
/// 64 hex characters (32 random bytes)
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Hex encoded SHA-256 of a secret, the lookup key of the gated path.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Treat blank strings like absent values.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required_email(email: Option<&str>) -> Result<&str, AppError> {
    present(email).ok_or(AppError::InvalidInput("Email required"))
}

/// Decide whether a gated request may proceed and charge it one unit.
///
/// # Process
///
/// 1. Reject when no credential was presented
/// 2. Look up the active key by the hash of the credential
/// 3. Apply the plan's period rules, persisting resets and expiry reverts
/// 4. Atomically increment usage and return the updated record
///
/// # Errors
///
/// - `Rejected(..)`: the request must not reach the protected handler
/// - `Store`: the key store failed
pub async fn admit(
    store: &dyn ApiKeyStore,
    presented: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ApiKeyRecord, AppError> {
    let secret = present(presented).ok_or(Rejection::CredentialMissing)?;

    let record = store
        .find_active_by_hash(&hash_secret(secret))
        .await?
        .ok_or(Rejection::InvalidOrInactiveKey)?;

    let Evaluation {
        verdict,
        record,
        rewritten,
    } = quota::evaluate(record, now);

    if rewritten {
        store.save(&record).await?;
    }

    if let Err(rejection) = verdict {
        if rejection == Rejection::PlanExpired {
            tracing::info!(key_id = %record.id, "paid plan lapsed, key reverted to free");
        }
        tracing::debug!(key_id = %record.id, plan = %record.plan, ?rejection, "request rejected");
        return Err(rejection.into());
    }

    // A concurrent request may have spent the last unit since the read above.
    let admitted = store
        .increment_usage(record.id, now)
        .await?
        .ok_or(Rejection::QuotaExceeded(QuotaWindow::for_plan(record.plan)))?;

    Ok(admitted)
}

/// Issue a new free-plan key for an owner.
///
/// No duplicate check is made: an owner may register several keys.
pub async fn register(
    store: &dyn ApiKeyStore,
    email: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ApiKeyRecord, AppError> {
    let email = required_email(email)?;

    let secret = generate_secret();
    let secret_hash = hash_secret(&secret);
    let record = ApiKeyRecord::issue(email, secret, secret_hash, now);

    store.insert(&record).await?;
    tracing::info!(key_id = %record.id, owner_email = %email, "api key registered");

    Ok(record)
}

/// Owner's active key, including its plaintext secret.
pub async fn lookup_by_owner(
    store: &dyn ApiKeyStore,
    email: Option<&str>,
) -> Result<ApiKeyRecord, AppError> {
    let email = required_email(email)?;

    store
        .find_active_by_owner(email)
        .await?
        .ok_or_else(AppError::key_not_found_for_email)
}

/// Replace the secret of an owner's active key.
///
/// Usage restarts at zero; plan, limit, validity and price are kept.
pub async fn regenerate(
    store: &dyn ApiKeyStore,
    email: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ApiKeyRecord, AppError> {
    let mut record = lookup_by_owner(store, email).await?;

    let secret = generate_secret();
    let secret_hash = hash_secret(&secret);
    record.rotate_secret(secret, secret_hash, now);

    store.save(&record).await?;
    tracing::info!(key_id = %record.id, plan = %record.plan, "api key regenerated");

    Ok(record)
}

/// Counter snapshot for a presented key.
///
/// Applies the free plan's daily reset but never spends quota and never
/// reverts a lapsed paid plan.
pub async fn usage(
    store: &dyn ApiKeyStore,
    presented: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ApiKeyRecord, AppError> {
    let secret = present(presented).ok_or(AppError::InvalidInput("API key required in header"))?;

    let mut record = store
        .find_active_by_hash(&hash_secret(secret))
        .await?
        .ok_or_else(AppError::key_not_found)?;

    if quota::refresh_daily_window(&mut record, now) {
        store.save(&record).await?;
    }

    Ok(record)
}

/// Move a presented key onto a paid plan for the next 30 days.
///
/// # Errors
///
/// - `InvalidInput`: key or plan missing
/// - `InvalidPlan`: plan is not `100k`, `1m` or `10m` (checked before the lookup)
/// - `KeyNotFound`: no active key matches
pub async fn upgrade(
    store: &dyn ApiKeyStore,
    presented: Option<&str>,
    plan: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ApiKeyRecord, AppError> {
    let (Some(secret), Some(plan)) = (present(presented), present(plan)) else {
        return Err(AppError::InvalidInput("API key and plan required"));
    };

    let plan = Plan::parse_upgrade_target(plan).map_err(|_| AppError::InvalidPlan)?;

    let mut record = store
        .find_active_by_hash(&hash_secret(secret))
        .await?
        .ok_or_else(AppError::key_not_found)?;

    record.apply_plan(plan, now);
    store.save(&record).await?;
    tracing::info!(
        key_id = %record.id,
        plan = %record.plan,
        price_paid = record.price_paid,
        "api key upgraded"
    );

    Ok(record)
}
