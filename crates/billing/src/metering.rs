//! Usage meter ledger: append-only usage facts priced against tiered rates.
//!
//! Each record's `unit_cost` is the tiered cost of its slice of the period's
//! running total, so the first units of a month fall into the free allowance
//! and later units price progressively higher. Hard limits are enforced at
//! write time per the tenant's overage policy.

use crate::model::{UsageMeter, UsageRecord};
use crate::rates::{self, RateTier};
use crate::store::BillingStore;
use chrono::Utc;
use mailroom_core::config::BillingConfig;
use mailroom_core::types::OveragePolicy;
use mailroom_core::{BillingError, BillingResult, Period};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct UsageLedger {
    store: Arc<BillingStore>,
    config: BillingConfig,
}

impl UsageLedger {
    pub fn new(store: Arc<BillingStore>, config: BillingConfig) -> Self {
        Self { store, config }
    }

    /// Create a tenant-scoped meter. Slug must be unique within the tenant;
    /// the tier table is validated up front so `record_usage` never sees a
    /// malformed one.
    pub fn create_meter(
        &self,
        tenant_id: Uuid,
        slug: &str,
        name: &str,
        rate_tiers: Vec<RateTier>,
        included_quantity: u64,
        hard_limit: u64,
    ) -> BillingResult<UsageMeter> {
        if slug.trim().is_empty() {
            return Err(BillingError::Validation("meter slug is required".into()));
        }
        rates::validate_tiers(&rate_tiers)?;
        if self.store.meter_by_slug(tenant_id, slug).is_some() {
            return Err(BillingError::Validation(format!(
                "meter slug '{slug}' already exists for tenant"
            )));
        }

        let now = Utc::now();
        let meter = UsageMeter {
            id: Uuid::new_v4(),
            tenant_id,
            slug: slug.to_string(),
            name: name.to_string(),
            rate_tiers,
            included_quantity,
            hard_limit,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_meter(meter.clone());
        info!(tenant_id = %tenant_id, slug = %slug, "Usage meter created");
        Ok(meter)
    }

    /// Soft-delete a meter. Existing records stay; new usage is refused.
    pub fn deactivate_meter(&self, tenant_id: Uuid, slug: &str) -> BillingResult<UsageMeter> {
        self.store
            .deactivate_meter(tenant_id, slug)
            .ok_or_else(|| BillingError::NotFound(format!("meter '{slug}'")))
    }

    /// Record a usage event against the current period.
    pub fn record_usage(
        &self,
        tenant_id: Uuid,
        meter_slug: &str,
        quantity: u64,
        customer_id: Option<Uuid>,
    ) -> BillingResult<UsageRecord> {
        if quantity == 0 {
            return Err(BillingError::Validation(
                "usage quantity must be positive".into(),
            ));
        }

        let meter = self
            .store
            .meter_by_slug(tenant_id, meter_slug)
            .filter(|m| m.is_active)
            .ok_or_else(|| BillingError::NotFound(format!("active meter '{meter_slug}'")))?;

        let period = Period::current();
        let current = self
            .store
            .meter_period_quantity(tenant_id, meter.id, period);

        if meter.hard_limit > 0 && current + quantity > meter.hard_limit {
            // Tenant config wins; the platform default covers tenants
            // without one.
            let policy = self
                .store
                .tenant_config(tenant_id)
                .map(|c| c.overage_policy)
                .unwrap_or(self.config.overage_policy);
            match policy {
                OveragePolicy::Block => {
                    return Err(BillingError::UsageLimitExceeded {
                        meter: meter.slug.clone(),
                        current,
                        requested: quantity,
                        hard_limit: meter.hard_limit,
                    });
                }
                OveragePolicy::Charge | OveragePolicy::AlertOnly => {
                    warn!(
                        tenant_id = %tenant_id,
                        meter = %meter.slug,
                        current,
                        quantity,
                        hard_limit = meter.hard_limit,
                        policy = ?policy,
                        "Usage over hard limit, recording per overage policy"
                    );
                }
            }
        }

        // Incremental pricing: this record covers positions
        // [current, current + quantity) of the period's running total, with
        // the meter's included allowance eating the bottom of the table.
        let unit_cost = rates::tiered_cost(
            &meter.rate_tiers,
            current + quantity,
            current.max(meter.included_quantity),
        )
        .cost;

        let record = UsageRecord {
            id: Uuid::new_v4(),
            tenant_id,
            meter_id: meter.id,
            customer_id,
            quantity,
            unit_cost,
            period,
            recorded_at: Utc::now(),
        };
        self.store.insert_usage_record(record.clone());
        info!(
            tenant_id = %tenant_id,
            meter = %meter.slug,
            quantity,
            unit_cost = %unit_cost,
            period = %period,
            "Usage recorded"
        );
        Ok(record)
    }

    /// Total quantity recorded for a meter in the given period.
    pub fn period_usage(
        &self,
        tenant_id: Uuid,
        meter_slug: &str,
        period: Period,
    ) -> BillingResult<u64> {
        let meter = self
            .store
            .meter_by_slug(tenant_id, meter_slug)
            .ok_or_else(|| BillingError::NotFound(format!("meter '{meter_slug}'")))?;
        Ok(self.store.meter_period_quantity(tenant_id, meter.id, period))
    }
}
