//! API key record and the request/response bodies of the key endpoints.
//!
//! Keys are looked up on the request path by the SHA-256 hash of the secret.
//! The plaintext secret is also persisted because the owner dashboard displays it.

use crate::models::plan::Plan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents one issued API key.
///
/// # Database Table
///
/// Maps to the `api_keys` table. One row per issued key; rows are never
/// deleted, only deactivated by setting `active = false`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ApiKeyRecord {
    /// Unique identifier, assigned at registration
    pub id: Uuid,

    /// Raw bearer secret as handed to the owner
    pub secret: String,

    /// Hex encoded SHA-256 of `secret` (64 characters)
    pub secret_hash: String,

    /// Contact address of the key holder (not unique)
    pub owner_email: String,

    /// Admitted requests in the current period
    pub usage: i64,

    /// Ceiling for `usage` in the current period, derived from `plan`
    pub usage_limit: i64,

    /// Last time `usage` was reset to zero
    pub last_reset: DateTime<Utc>,

    /// Expiry of a paid plan. Always `None` on the free plan.
    pub valid_until: Option<DateTime<Utc>>,

    #[sqlx(try_from = "String")]
    pub plan: Plan,

    /// Amount paid for the current plan window
    pub price_paid: i64,

    /// Inactive keys are rejected regardless of their counters
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    /// Build a fresh free-plan record for a newly generated secret.
    pub fn issue(
        owner_email: impl Into<String>,
        secret: String,
        secret_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            secret,
            secret_hash,
            owner_email: owner_email.into(),
            usage: 0,
            usage_limit: Plan::Free.usage_limit(),
            last_reset: now,
            valid_until: None,
            plan: Plan::Free,
            price_paid: 0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Requests left in the current period.
    pub fn remaining(&self) -> i64 {
        (self.usage_limit - self.usage).max(0)
    }

    pub fn has_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| now > until)
    }

    /// Zero the counter and start a new period at `now`.
    pub fn reset_usage(&mut self, now: DateTime<Utc>) {
        self.usage = 0;
        self.last_reset = now;
        self.updated_at = now;
    }

    /// Drop a lapsed paid plan back to free-plan defaults.
    pub fn revert_to_free(&mut self, now: DateTime<Utc>) {
        self.plan = Plan::Free;
        self.usage_limit = Plan::Free.usage_limit();
        self.valid_until = None;
        self.price_paid = 0;
        self.reset_usage(now);
    }

    /// Move the key onto a paid plan for a fresh validity window.
    pub fn apply_plan(&mut self, plan: Plan, now: DateTime<Utc>) {
        self.plan = plan;
        self.usage_limit = plan.usage_limit();
        self.valid_until = plan.validity().map(|window| now + window);
        self.price_paid = plan.price();
        self.reset_usage(now);
    }

    /// Replace the secret/hash pair. Plan, limit and validity are kept.
    pub fn rotate_secret(&mut self, secret: String, secret_hash: String, now: DateTime<Utc>) {
        self.secret = secret;
        self.secret_hash = secret_hash;
        self.reset_usage(now);
    }
}

/// Body of `POST /api/v1/keys/register` and `POST /api/v1/keys/regenerate`.
///
/// `email` is optional at the type level so a missing field yields the
/// `Email required` error instead of a JSON extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct OwnerRequest {
    #[serde(default)]
    pub email: Option<String>,
}

/// Query string of `GET /api/v1/keys/dashboard`.
#[derive(Debug, Default, Deserialize)]
pub struct OwnerQuery {
    #[serde(default)]
    pub email: Option<String>,
}

/// Body of `POST /api/v1/keys/upgrade`.
#[derive(Debug, Default, Deserialize)]
pub struct UpgradeRequest {
    #[serde(default)]
    pub plan: Option<String>,
}

/// Returned once when a secret is issued (register or regenerate).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedKeyResponse {
    pub success: bool,
    pub api_key: String,
    pub usage_limit: i64,
}

/// Owner dashboard view of a key.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub success: bool,
    pub api_key: String,
    pub usage: i64,
    pub usage_limit: i64,
    pub remaining: i64,
    pub plan: Plan,
    pub reset_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl From<ApiKeyRecord> for DashboardResponse {
    fn from(record: ApiKeyRecord) -> Self {
        Self {
            success: true,
            usage: record.usage,
            usage_limit: record.usage_limit,
            remaining: record.remaining(),
            plan: record.plan,
            reset_date: record.last_reset,
            valid_until: record.valid_until,
            api_key: record.secret,
        }
    }
}

/// Counter snapshot for the key presented in the header.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub success: bool,
    pub usage: i64,
    pub usage_limit: i64,
    pub remaining: i64,
    pub plan: Plan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl From<&ApiKeyRecord> for UsageResponse {
    fn from(record: &ApiKeyRecord) -> Self {
        Self {
            success: true,
            usage: record.usage,
            usage_limit: record.usage_limit,
            remaining: record.remaining(),
            plan: record.plan,
            valid_until: record.valid_until,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeResponse {
    pub success: bool,
    pub message: String,
    pub usage_limit: i64,
    pub valid_until: Option<DateTime<Utc>>,
    pub price_paid: i64,
}

impl From<&ApiKeyRecord> for UpgradeResponse {
    fn from(record: &ApiKeyRecord) -> Self {
        Self {
            success: true,
            message: format!("Upgraded to {} plan", record.plan),
            usage_limit: record.usage_limit,
            valid_until: record.valid_until,
            price_paid: record.price_paid,
        }
    }
}
