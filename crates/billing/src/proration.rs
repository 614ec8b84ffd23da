//! Mid-cycle proration for plan and add-on changes.
//!
//! Pure functions: identical input always yields identical output, which
//! keeps retries safe and tests trivial. Positive amounts are additional
//! charges, negative amounts are credits, zero is a no-op.

use chrono::{DateTime, Utc};
use mailroom_core::Money;
use serde::{Deserialize, Serialize};

/// Conventional billing month used when the caller has no exact period length.
pub const DEFAULT_DAYS_IN_PERIOD: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proration {
    pub amount: Money,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOnProration {
    pub prorated_price: Money,
    pub days_remaining: i64,
    pub days_in_period: i64,
}

/// Prorated cost of switching plans with `days_remaining` left in the period.
///
/// Daily rate difference times remaining days, rounded to cents once.
pub fn plan_change_proration(
    old_monthly: Money,
    new_monthly: Money,
    days_remaining: i64,
    total_days_in_period: i64,
) -> Proration {
    let days = total_days_in_period.max(1);
    let remaining = days_remaining.clamp(0, days);

    let old_daily = old_monthly.cents() as f64 / days as f64;
    let new_daily = new_monthly.cents() as f64 / days as f64;
    let amount = Money::from_cents(((new_daily - old_daily) * remaining as f64).round() as i64);

    let description = if amount.is_positive() {
        format!(
            "Prorated upgrade charge: {remaining} of {days} days at {} -> {} monthly",
            old_monthly, new_monthly
        )
    } else if amount.is_zero() {
        "No proration due".to_string()
    } else {
        format!(
            "Prorated downgrade credit: {remaining} of {days} days at {} -> {} monthly",
            old_monthly, new_monthly
        )
    };

    Proration {
        amount,
        description,
    }
}

/// Prorated price for an add-on purchased mid-cycle, charged for the days
/// left until `period_end`.
pub fn add_on_proration(
    monthly_price: Money,
    now: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> AddOnProration {
    let days_in_period = DEFAULT_DAYS_IN_PERIOD;
    let days_remaining = (period_end - now).num_days().clamp(0, days_in_period);
    let daily = monthly_price.cents() as f64 / days_in_period as f64;
    AddOnProration {
        prorated_price: Money::from_cents((daily * days_remaining as f64).round() as i64),
        days_remaining,
        days_in_period,
    }
}
