//! Subscription plans and their quota ceilings.
//!
//! A key is always on exactly one plan. The free plan resets its counter every
//! UTC calendar day; paid plans run for a fixed validity window and never reset
//! on their own.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How long a paid plan stays valid after an upgrade.
pub const PAID_PLAN_VALIDITY_DAYS: i64 = 30;

/// Plan tier of an API key.
///
/// Stored as TEXT in the `api_keys.plan` column using the same spelling as the
/// JSON representation (`free`, `100k`, `1m`, `10m`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plan {
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "100k")]
    Paid100K,
    #[serde(rename = "1m")]
    Paid1M,
    #[serde(rename = "10m")]
    Paid10M,
}

/// Returned when a plan name is not one of the known tiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plan `{0}`")]
pub struct UnknownPlan(pub String);

impl Plan {
    /// Maximum number of admitted requests per period.
    pub fn usage_limit(self) -> i64 {
        match self {
            Plan::Free => 100,
            Plan::Paid100K => 100_000,
            Plan::Paid1M => 1_000_000,
            Plan::Paid10M => 10_000_000,
        }
    }

    /// Fixed price charged for one validity window.
    pub fn price(self) -> i64 {
        match self {
            Plan::Free => 0,
            Plan::Paid100K => 300,
            Plan::Paid1M => 1000,
            Plan::Paid10M => 5000,
        }
    }

    pub fn is_paid(self) -> bool {
        !matches!(self, Plan::Free)
    }

    /// Validity window granted by an upgrade. `None` for the free plan.
    pub fn validity(self) -> Option<Duration> {
        self.is_paid().then(|| Duration::days(PAID_PLAN_VALIDITY_DAYS))
    }

    /// Parse a plan that may be the target of an upgrade.
    ///
    /// Only paid tiers qualify; `free` is reachable only through expiry.
    pub fn parse_upgrade_target(name: &str) -> Result<Self, UnknownPlan> {
        match name.parse::<Plan>()? {
            Plan::Free => Err(UnknownPlan(name.to_string())),
            plan => Ok(plan),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Paid100K => "100k",
            Plan::Paid1M => "1m",
            Plan::Paid10M => "10m",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "100k" => Ok(Plan::Paid100K),
            "1m" => Ok(Plan::Paid1M),
            "10m" => Ok(Plan::Paid10M),
            other => Err(UnknownPlan(other.to_string())),
        }
    }
}

/// Lets sqlx decode the TEXT column through `#[sqlx(try_from = "String")]`.
impl TryFrom<String> for Plan {
    type Error = UnknownPlan;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
