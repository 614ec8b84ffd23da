//! Per-customer plan-quota tracking.
//!
//! Counters are upserted incrementally into one row per
//! `(tenant, customer, period)` and never decrease within a period; rollover
//! simply starts a fresh row. Nothing is priced here: overage counts and
//! percentages are computed at read time against the customer's plan tier,
//! so there is no derived state to drift from the source counters.

use crate::model::PmbQuotaUsage;
use crate::store::BillingStore;
use mailroom_core::types::{PlanQuota, QuotaService};
use mailroom_core::{BillingResult, Money, Period};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Read-model row for one service's quota position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceQuotaStatus {
    pub service: QuotaService,
    pub used: u64,
    pub included: u64,
    pub remaining: u64,
    pub overage: u64,
    pub percent_used: f64,
    /// The plan's per-unit overage rate; what the presentation layer would
    /// bill each overage unit at.
    pub overage_rate: Money,
}

/// Full quota position for a customer in one period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaStatusReport {
    pub customer_id: Uuid,
    pub period: Period,
    pub services: Vec<ServiceQuotaStatus>,
}

pub struct QuotaTracker {
    store: Arc<BillingStore>,
}

impl QuotaTracker {
    pub fn new(store: Arc<BillingStore>) -> Self {
        Self { store }
    }

    /// Increment one of the six counters for the current period.
    pub fn record(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        service: QuotaService,
        quantity: u64,
    ) -> PmbQuotaUsage {
        let row = self.store.increment_quota(
            tenant_id,
            customer_id,
            Period::current(),
            service,
            quantity,
        );
        debug!(
            tenant_id = %tenant_id,
            customer_id = %customer_id,
            service = %service,
            quantity,
            "Quota consumption recorded"
        );
        row
    }

    /// String-keyed variant for callers holding a raw service name; unknown
    /// keys are a validation error and write nothing.
    pub fn record_consumption(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        service: &str,
        quantity: u64,
    ) -> BillingResult<PmbQuotaUsage> {
        let service: QuotaService = service.parse()?;
        Ok(self.record(tenant_id, customer_id, service, quantity))
    }

    pub fn current_usage(&self, tenant_id: Uuid, customer_id: Uuid) -> Option<PmbQuotaUsage> {
        self.store
            .quota_row(tenant_id, customer_id, Period::current())
    }

    /// Compute the customer's quota position against their plan tier. A
    /// missing row means a fresh period: everything at zero.
    pub fn quota_status(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        plan: &PlanQuota,
    ) -> QuotaStatusReport {
        let period = Period::current();
        let row = self
            .store
            .quota_row(tenant_id, customer_id, period)
            .unwrap_or_else(|| PmbQuotaUsage::new(tenant_id, customer_id, period));

        let services = QuotaService::ALL
            .into_iter()
            .map(|service| {
                let used = row.counter(service);
                let included = plan.included_for(service);
                let percent_used = if included == 0 {
                    if used > 0 {
                        100.0
                    } else {
                        0.0
                    }
                } else {
                    used as f64 / included as f64 * 100.0
                };
                ServiceQuotaStatus {
                    service,
                    used,
                    included,
                    remaining: included.saturating_sub(used),
                    overage: used.saturating_sub(included),
                    percent_used,
                    overage_rate: plan.overage_rate_for(service),
                }
            })
            .collect();

        QuotaStatusReport {
            customer_id,
            period,
            services,
        }
    }
}
