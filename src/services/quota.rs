//! Quota evaluation for gated requests.
//!
//! `evaluate` decides whether a loaded key may spend one more request at a
//! given instant. It performs no I/O: period resets and plan expiry are applied
//! to the returned record, and the caller persists them.
//!
//! # Rules
//!
//! - **free**: the counter restarts whenever the UTC calendar date of
//!   `last_reset` differs from today's, before the limit is checked.
//! - **paid**: no periodic reset. Once `valid_until` has passed the key falls
//!   back to the free plan and the request that discovered the expiry is
//!   refused with `PlanExpired`, even though the fresh free quota would allow it.

use crate::models::{api_key::ApiKeyRecord, plan::Plan};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use std::fmt;

/// Period whose quota was exhausted. Selects the message shown to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaWindow {
    Daily,
    Monthly,
}

impl QuotaWindow {
    pub fn for_plan(plan: Plan) -> Self {
        if plan.is_paid() {
            QuotaWindow::Monthly
        } else {
            QuotaWindow::Daily
        }
    }
}

/// Message shown when the window's quota is exhausted.
impl fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QuotaWindow::Daily => "API usage limit reached. Please wait for daily reset.",
            QuotaWindow::Monthly => "API usage limit reached for this month. Please renew.",
        })
    }
}

/// Reasons a gated request is refused before reaching its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("API key required in header")]
    CredentialMissing,

    #[error("Invalid or inactive API key")]
    InvalidOrInactiveKey,

    #[error("{0}")]
    QuotaExceeded(QuotaWindow),

    #[error("Plan expired. Please renew.")]
    PlanExpired,
}

impl Rejection {
    pub fn status(self) -> StatusCode {
        match self {
            Rejection::CredentialMissing => StatusCode::UNAUTHORIZED,
            Rejection::InvalidOrInactiveKey | Rejection::PlanExpired => StatusCode::FORBIDDEN,
            Rejection::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Outcome of evaluating one request against a key.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// `Ok(())` when the request may spend one unit of quota.
    pub verdict: Result<(), Rejection>,

    /// Record after period rules were applied. Usage is not yet incremented.
    pub record: ApiKeyRecord,

    /// Whether `record` differs from what was loaded and must be written back.
    pub rewritten: bool,
}

/// True when `last_reset` falls on an earlier or later UTC calendar day than `now`.
///
/// Compares year, month and day; this is not a rolling 24 hour window.
pub fn crosses_utc_day(last_reset: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    last_reset.date_naive() != now.date_naive()
}

/// Apply the free plan's daily reset if a new UTC day has started.
///
/// Returns whether the record changed. Paid plans are left alone.
pub fn refresh_daily_window(record: &mut ApiKeyRecord, now: DateTime<Utc>) -> bool {
    if record.plan == Plan::Free && crosses_utc_day(record.last_reset, now) {
        record.reset_usage(now);
        true
    } else {
        false
    }
}

/// Decide admission for `record` at `now`.
///
/// Inactive records are refused before any period rule runs.
pub fn evaluate(mut record: ApiKeyRecord, now: DateTime<Utc>) -> Evaluation {
    if !record.active {
        return Evaluation {
            verdict: Err(Rejection::InvalidOrInactiveKey),
            record,
            rewritten: false,
        };
    }

    if record.plan.is_paid() && record.has_lapsed(now) {
        record.revert_to_free(now);
        return Evaluation {
            verdict: Err(Rejection::PlanExpired),
            record,
            rewritten: true,
        };
    }

    let rewritten = refresh_daily_window(&mut record, now);

    let verdict = if record.usage >= record.usage_limit {
        Err(Rejection::QuotaExceeded(QuotaWindow::for_plan(record.plan)))
    } else {
        Ok(())
    };

    Evaluation {
        verdict,
        record,
        rewritten,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn free_key(usage: i64, last_reset: DateTime<Utc>) -> ApiKeyRecord {
        let mut key = ApiKeyRecord::issue("a@x.com", "s".into(), "h".into(), last_reset);
        key.usage = usage;
        key
    }

    fn paid_key(plan: Plan, usage: i64, upgraded_at: DateTime<Utc>) -> ApiKeyRecord {
        let mut key = free_key(0, upgraded_at);
        key.apply_plan(plan, upgraded_at);
        key.usage = usage;
        key
    }

    #[test]
    fn test_free_key_same_day_under_limit() {
        let now = at(2025, 6, 10, 15, 0);
        let eval = evaluate(free_key(99, at(2025, 6, 10, 1, 0)), now);

        assert_eq!(eval.verdict, Ok(()));
        assert!(!eval.rewritten);
        assert_eq!(eval.record.usage, 99);
    }

    #[test]
    fn test_free_key_same_day_at_limit() {
        let now = at(2025, 6, 10, 15, 0);
        let eval = evaluate(free_key(100, at(2025, 6, 10, 1, 0)), now);

        assert_eq!(
            eval.verdict,
            Err(Rejection::QuotaExceeded(QuotaWindow::Daily))
        );
        assert!(!eval.rewritten);
    }

    #[test]
    fn test_free_key_resets_on_new_utc_day() {
        let now = at(2025, 6, 11, 0, 1);
        let eval = evaluate(free_key(100, at(2025, 6, 10, 23, 59)), now);

        assert_eq!(eval.verdict, Ok(()));
        assert!(eval.rewritten);
        assert_eq!(eval.record.usage, 0);
        assert_eq!(eval.record.last_reset, now);
    }

    #[test]
    fn test_free_key_reset_is_calendar_based() {
        // 47 hours of silence still yields exactly one reset.
        let last = at(2025, 6, 10, 0, 30);
        let now = last + Duration::hours(47);
        let eval = evaluate(free_key(100, last), now);
        assert!(eval.rewritten);
        assert_eq!(eval.record.usage, 0);

        // 23 hours within one UTC date never resets.
        let last = at(2025, 6, 10, 0, 30);
        let now = at(2025, 6, 10, 23, 30);
        let eval = evaluate(free_key(100, last), now);
        assert!(!eval.rewritten);
        assert!(eval.verdict.is_err());
    }

    #[test]
    fn test_paid_key_lapsed_reverts_and_rejects() {
        let upgraded = at(2025, 5, 1, 12, 0);
        let mut key = paid_key(Plan::Paid100K, 5, upgraded);
        let now = at(2025, 6, 1, 12, 0);
        key.valid_until = Some(now - Duration::seconds(1));

        let eval = evaluate(key, now);

        assert_eq!(eval.verdict, Err(Rejection::PlanExpired));
        assert!(eval.rewritten);
        assert_eq!(eval.record.plan, Plan::Free);
        assert_eq!(eval.record.usage_limit, 100);
        assert_eq!(eval.record.usage, 0);
        assert_eq!(eval.record.valid_until, None);
        assert_eq!(eval.record.price_paid, 0);
        assert_eq!(eval.record.last_reset, now);
    }

    #[test]
    fn test_paid_key_expiry_is_strict() {
        let upgraded = at(2025, 5, 1, 12, 0);
        let key = paid_key(Plan::Paid1M, 0, upgraded);
        let boundary = key.valid_until.unwrap();

        assert_eq!(evaluate(key.clone(), boundary).verdict, Ok(()));
        assert_eq!(
            evaluate(key, boundary + Duration::milliseconds(1)).verdict,
            Err(Rejection::PlanExpired)
        );
    }

    #[test]
    fn test_paid_key_does_not_reset_daily() {
        let upgraded = at(2025, 5, 1, 12, 0);
        let key = paid_key(Plan::Paid100K, 100_000, upgraded);
        let eval = evaluate(key, at(2025, 5, 3, 9, 0));

        assert_eq!(
            eval.verdict,
            Err(Rejection::QuotaExceeded(QuotaWindow::Monthly))
        );
        assert!(!eval.rewritten);
        assert_eq!(eval.record.usage, 100_000);
    }

    #[test]
    fn test_inactive_key_always_rejected() {
        let now = at(2025, 6, 10, 15, 0);

        let mut free = free_key(0, at(2025, 6, 1, 0, 0));
        free.active = false;
        let mut lapsed = paid_key(Plan::Paid10M, 0, at(2025, 1, 1, 0, 0));
        lapsed.active = false;

        for key in [free, lapsed] {
            let eval = evaluate(key, now);
            assert_eq!(eval.verdict, Err(Rejection::InvalidOrInactiveKey));
            assert!(!eval.rewritten);
        }
    }

    #[test]
    fn test_refresh_daily_window_ignores_paid_plans() {
        let mut key = paid_key(Plan::Paid1M, 10, at(2025, 5, 1, 12, 0));
        assert!(!refresh_daily_window(&mut key, at(2025, 5, 5, 0, 0)));
        assert_eq!(key.usage, 10);
    }
}
