//! Tiered rate calculation.
//!
//! A rate table is an ordered list of quantity bands, each billed at its own
//! per-unit rate. The walk is positional: units occupy tier capacity in order,
//! so the cost of a quantity slice depends on where in the period's running
//! total the slice sits. Monetary rounding happens exactly once, on the final
//! sum, never per tier.

use mailroom_core::{BillingError, BillingResult, Money};
use serde::{Deserialize, Serialize};

/// One band of a tiered price schedule. `up_to = None` marks the unbounded
/// final tier; a valid table has exactly one, in last position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTier {
    pub up_to: Option<u64>,
    /// Dollars per unit. Kept as a decimal rate on the wire; converted to
    /// cents only after the full walk.
    pub rate: f64,
}

/// Per-tier contribution to a computed cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierBreakdown {
    pub up_to: Option<u64>,
    pub units: u64,
    pub rate: f64,
    pub amount: f64,
}

/// Result of a tiered cost calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateOutcome {
    pub cost: Money,
    pub breakdown: Vec<TierBreakdown>,
}

impl RateOutcome {
    fn zero() -> Self {
        Self {
            cost: Money::ZERO,
            breakdown: Vec::new(),
        }
    }
}

/// Check the shape invariants of a rate table: ceilings strictly ascending,
/// rates non-negative, and exactly one unbounded tier sitting last.
pub fn validate_tiers(tiers: &[RateTier]) -> BillingResult<()> {
    if tiers.is_empty() {
        // An unconfigured meter is a legal state that prices everything at zero.
        return Ok(());
    }
    let mut prev_ceiling = 0u64;
    for (i, tier) in tiers.iter().enumerate() {
        if tier.rate < 0.0 {
            return Err(BillingError::Validation(format!(
                "tier {i} has negative rate {}",
                tier.rate
            )));
        }
        match tier.up_to {
            Some(ceiling) => {
                if i == tiers.len() - 1 {
                    return Err(BillingError::Validation(
                        "last tier must be unbounded (up_to = null)".into(),
                    ));
                }
                if ceiling <= prev_ceiling {
                    return Err(BillingError::Validation(format!(
                        "tier {i} ceiling {ceiling} not above previous {prev_ceiling}"
                    )));
                }
                prev_ceiling = ceiling;
            }
            None => {
                if i != tiers.len() - 1 {
                    return Err(BillingError::Validation(
                        "unbounded tier must be last".into(),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Cost of `quantity` units with the first `included_free` of them free.
///
/// Free units still consume tier capacity: billable units are priced at the
/// positions `included_free..quantity` of the table, so later units land in
/// progressively higher tiers. Empty tables and `quantity <= included_free`
/// both cost zero.
pub fn tiered_cost(tiers: &[RateTier], quantity: u64, included_free: u64) -> RateOutcome {
    if tiers.is_empty() || quantity <= included_free {
        return RateOutcome::zero();
    }

    let mut cursor = included_free;
    let mut total = 0.0f64;
    let mut breakdown = Vec::new();

    for tier in tiers {
        if cursor >= quantity {
            break;
        }
        let ceiling = tier.up_to.unwrap_or(u64::MAX);
        if ceiling <= cursor {
            continue;
        }
        let units = ceiling.min(quantity) - cursor;
        let amount = units as f64 * tier.rate;
        total += amount;
        breakdown.push(TierBreakdown {
            up_to: tier.up_to,
            units,
            rate: tier.rate,
            amount,
        });
        cursor += units;
    }

    RateOutcome {
        cost: Money::from_dollars(total),
        breakdown,
    }
}
