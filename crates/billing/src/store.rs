//! In-memory, tenant-scoped repository for every billing entity family.
//!
//! Backed by `DashMap` and injected as `Arc<BillingStore>` into each engine;
//! swap for a SQL-backed implementation in production. Every query filters by
//! `tenant_id`; no method exposes unscoped reads.
//!
//! The deferred-charge credit gate is the one place needing atomicity: the
//! read-outstanding / compare-to-limit / write-balance sequence runs under a
//! per-customer mutex so concurrent deferred charges for the same customer
//! can never land the account over its limit.

use crate::model::{
    BillingModelConfig, ChargeEvent, CustomerBillingProfile, Invoice, Package, PmbQuotaUsage,
    TosCharge, UsageMeter, UsageRecord,
};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use mailroom_core::types::{ChargeStatus, QuotaService, TosChargeStatus};
use mailroom_core::{BillingError, BillingResult, Money, Period};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

type CustomerKey = (Uuid, Uuid);

/// Shared transactional store for all billing entities.
pub struct BillingStore {
    meters: DashMap<Uuid, UsageMeter>,
    usage_records: DashMap<Uuid, UsageRecord>,
    quota_rows: DashMap<(Uuid, Uuid, Period), PmbQuotaUsage>,
    profiles: DashMap<CustomerKey, CustomerBillingProfile>,
    tos_charges: DashMap<Uuid, TosCharge>,
    charge_events: DashMap<Uuid, ChargeEvent>,
    invoices: DashMap<Uuid, Invoice>,
    tenant_configs: DashMap<Uuid, BillingModelConfig>,
    packages: DashMap<Uuid, Package>,
    /// Serializes the credit check-and-reserve sequence per customer.
    reservation_locks: DashMap<CustomerKey, Arc<Mutex<()>>>,
}

impl Default for BillingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BillingStore {
    pub fn new() -> Self {
        Self {
            meters: DashMap::new(),
            usage_records: DashMap::new(),
            quota_rows: DashMap::new(),
            profiles: DashMap::new(),
            tos_charges: DashMap::new(),
            charge_events: DashMap::new(),
            invoices: DashMap::new(),
            tenant_configs: DashMap::new(),
            packages: DashMap::new(),
            reservation_locks: DashMap::new(),
        }
    }

    fn reservation_lock(&self, tenant_id: Uuid, customer_id: Uuid) -> Arc<Mutex<()>> {
        self.reservation_locks
            .entry((tenant_id, customer_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ------------------------------------------------------------------
    // Usage meters
    // ------------------------------------------------------------------

    pub fn insert_meter(&self, meter: UsageMeter) {
        self.meters.insert(meter.id, meter);
    }

    pub fn meter_by_slug(&self, tenant_id: Uuid, slug: &str) -> Option<UsageMeter> {
        self.meters
            .iter()
            .find(|e| e.value().tenant_id == tenant_id && e.value().slug == slug)
            .map(|e| e.value().clone())
    }

    pub fn deactivate_meter(&self, tenant_id: Uuid, slug: &str) -> Option<UsageMeter> {
        let id = self
            .meters
            .iter()
            .find(|e| e.value().tenant_id == tenant_id && e.value().slug == slug)
            .map(|e| *e.key())?;
        self.meters.get_mut(&id).map(|mut m| {
            m.is_active = false;
            m.updated_at = Utc::now();
            m.clone()
        })
    }

    pub fn meters_for_tenant(&self, tenant_id: Uuid) -> Vec<UsageMeter> {
        self.meters
            .iter()
            .filter(|e| e.value().tenant_id == tenant_id)
            .map(|e| e.value().clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Usage records
    // ------------------------------------------------------------------

    pub fn insert_usage_record(&self, record: UsageRecord) {
        self.usage_records.insert(record.id, record);
    }

    pub fn usage_record(&self, tenant_id: Uuid, id: Uuid) -> Option<UsageRecord> {
        self.usage_records
            .get(&id)
            .filter(|e| e.value().tenant_id == tenant_id)
            .map(|e| e.value().clone())
    }

    /// Compensation path only: unwind a usage record written inside a
    /// charge-generation sequence that subsequently failed. Records are
    /// otherwise append-only.
    pub fn remove_usage_record(&self, tenant_id: Uuid, id: Uuid) -> Option<UsageRecord> {
        if self
            .usage_records
            .get(&id)
            .map(|e| e.value().tenant_id == tenant_id)
            .unwrap_or(false)
        {
            self.usage_records.remove(&id).map(|(_, r)| r)
        } else {
            None
        }
    }

    /// Sum of record quantities for a meter in one period.
    pub fn meter_period_quantity(&self, tenant_id: Uuid, meter_id: Uuid, period: Period) -> u64 {
        self.usage_records
            .iter()
            .filter(|e| {
                let r = e.value();
                r.tenant_id == tenant_id && r.meter_id == meter_id && r.period == period
            })
            .map(|e| e.value().quantity)
            .sum()
    }

    pub fn usage_records_for_meter(
        &self,
        tenant_id: Uuid,
        meter_id: Uuid,
        period: Period,
    ) -> Vec<UsageRecord> {
        self.usage_records
            .iter()
            .filter(|e| {
                let r = e.value();
                r.tenant_id == tenant_id && r.meter_id == meter_id && r.period == period
            })
            .map(|e| e.value().clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Quota rows
    // ------------------------------------------------------------------

    /// Upsert the `(tenant, customer, period)` row and bump one counter.
    pub fn increment_quota(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        period: Period,
        service: QuotaService,
        quantity: u64,
    ) -> PmbQuotaUsage {
        let mut row = self
            .quota_rows
            .entry((tenant_id, customer_id, period))
            .or_insert_with(|| PmbQuotaUsage::new(tenant_id, customer_id, period));
        *row.counter_mut(service) += quantity;
        row.updated_at = Utc::now();
        row.clone()
    }

    pub fn quota_row(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        period: Period,
    ) -> Option<PmbQuotaUsage> {
        self.quota_rows
            .get(&(tenant_id, customer_id, period))
            .map(|e| e.value().clone())
    }

    // ------------------------------------------------------------------
    // Customer billing profiles
    // ------------------------------------------------------------------

    pub fn upsert_profile(&self, profile: CustomerBillingProfile) {
        self.profiles
            .insert((profile.tenant_id, profile.customer_id), profile);
    }

    pub fn profile(&self, tenant_id: Uuid, customer_id: Uuid) -> Option<CustomerBillingProfile> {
        self.profiles
            .get(&(tenant_id, customer_id))
            .map(|e| e.value().clone())
    }

    // ------------------------------------------------------------------
    // TOS charges
    // ------------------------------------------------------------------

    pub fn insert_tos_charge(&self, charge: TosCharge) {
        self.tos_charges.insert(charge.id, charge);
    }

    pub fn tos_charge(&self, tenant_id: Uuid, id: Uuid) -> Option<TosCharge> {
        self.tos_charges
            .get(&id)
            .filter(|e| e.value().tenant_id == tenant_id)
            .map(|e| e.value().clone())
    }

    pub fn tos_by_idempotency_key(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        key: &str,
    ) -> Option<TosCharge> {
        self.tos_charges
            .iter()
            .find(|e| {
                let c = e.value();
                c.tenant_id == tenant_id
                    && c.customer_id == customer_id
                    && c.idempotency_key.as_deref() == Some(key)
            })
            .map(|e| e.value().clone())
    }

    /// Sum of `total` over this customer's charges still counting against the
    /// credit limit (`pending` or `invoiced`).
    pub fn outstanding_total(&self, tenant_id: Uuid, customer_id: Uuid) -> Money {
        self.tos_charges
            .iter()
            .filter(|e| {
                let c = e.value();
                c.tenant_id == tenant_id
                    && c.customer_id == customer_id
                    && matches!(
                        c.status,
                        TosChargeStatus::Pending | TosChargeStatus::Invoiced
                    )
            })
            .map(|e| e.value().total)
            .sum()
    }

    /// Atomically gate a new deferred charge against the customer's credit
    /// limit and, on success, persist it and raise `account_balance` by its
    /// total. Runs under the per-customer reservation lock; on rejection
    /// nothing is written.
    pub fn create_deferred_charge(&self, charge: TosCharge) -> BillingResult<TosCharge> {
        let key = (charge.tenant_id, charge.customer_id);
        let lock = self.reservation_lock(charge.tenant_id, charge.customer_id);
        let _guard = lock.lock();

        let credit_limit = self
            .profiles
            .get(&key)
            .map(|e| e.value().credit_limit)
            .ok_or_else(|| {
                BillingError::NotFound(format!(
                    "billing profile for customer {}",
                    charge.customer_id
                ))
            })?;

        let outstanding = self.outstanding_total(charge.tenant_id, charge.customer_id);
        if credit_limit.is_positive() && outstanding + charge.total > credit_limit {
            return Err(BillingError::CreditLimitExceeded {
                outstanding,
                credit_limit,
                charge_amount: charge.total,
            });
        }

        if let Some(mut profile) = self.profiles.get_mut(&key) {
            profile.account_balance += charge.total;
            profile.updated_at = Utc::now();
        }
        self.tos_charges.insert(charge.id, charge.clone());
        Ok(charge)
    }

    /// Replace a TOS charge and adjust the owning profile's `account_balance`
    /// by `balance_delta` in the same reservation-locked scope. The router
    /// validates transitions; this only applies the mechanics.
    pub fn apply_tos_update(
        &self,
        charge: TosCharge,
        balance_delta: Money,
    ) -> BillingResult<TosCharge> {
        let key = (charge.tenant_id, charge.customer_id);
        let lock = self.reservation_lock(charge.tenant_id, charge.customer_id);
        let _guard = lock.lock();

        if !balance_delta.is_zero() {
            let mut profile = self.profiles.get_mut(&key).ok_or_else(|| {
                BillingError::NotFound(format!(
                    "billing profile for customer {}",
                    charge.customer_id
                ))
            })?;
            profile.account_balance += balance_delta;
            profile.updated_at = Utc::now();
        }
        self.tos_charges.insert(charge.id, charge.clone());
        Ok(charge)
    }

    // ------------------------------------------------------------------
    // Charge events
    // ------------------------------------------------------------------

    pub fn insert_charge_event(&self, event: ChargeEvent) {
        self.charge_events.insert(event.id, event);
    }

    pub fn charge_event(&self, tenant_id: Uuid, id: Uuid) -> Option<ChargeEvent> {
        self.charge_events
            .get(&id)
            .filter(|e| e.value().tenant_id == tenant_id)
            .map(|e| e.value().clone())
    }

    pub fn update_charge_event(&self, event: ChargeEvent) {
        self.charge_events.insert(event.id, event);
    }

    pub fn remove_charge_event(&self, tenant_id: Uuid, id: Uuid) -> Option<ChargeEvent> {
        if self
            .charge_events
            .get(&id)
            .map(|e| e.value().tenant_id == tenant_id)
            .unwrap_or(false)
        {
            self.charge_events.remove(&id).map(|(_, e)| e)
        } else {
            None
        }
    }

    pub fn event_by_idempotency_key(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        key: &str,
    ) -> Option<ChargeEvent> {
        self.charge_events
            .iter()
            .find(|e| {
                let ev = e.value();
                ev.tenant_id == tenant_id
                    && ev.customer_id == customer_id
                    && ev.idempotency_key.as_deref() == Some(key)
            })
            .map(|e| e.value().clone())
    }

    /// Charge events eligible for invoicing (`pending` or `posted`) for one
    /// customer, optionally bounded to a creation window.
    pub fn billable_events(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        window_start: Option<DateTime<Utc>>,
        window_end: Option<DateTime<Utc>>,
    ) -> Vec<ChargeEvent> {
        let mut events: Vec<ChargeEvent> = self
            .charge_events
            .iter()
            .filter(|e| {
                let ev = e.value();
                ev.tenant_id == tenant_id
                    && ev.customer_id == customer_id
                    && matches!(ev.status, ChargeStatus::Pending | ChargeStatus::Posted)
                    && window_start.map(|s| ev.created_at >= s).unwrap_or(true)
                    && window_end.map(|t| ev.created_at <= t).unwrap_or(true)
            })
            .map(|e| e.value().clone())
            .collect();
        events.sort_by_key(|e| e.created_at);
        events
    }

    /// Flip the given events to `invoiced`, returning only those that were
    /// still billable at flip time. A concurrent aggregation can therefore
    /// never consume the same event twice.
    pub fn claim_events_for_invoice(&self, tenant_id: Uuid, ids: &[Uuid]) -> Vec<ChargeEvent> {
        let mut claimed = Vec::new();
        for id in ids {
            if let Some(mut entry) = self.charge_events.get_mut(id) {
                let ev = entry.value_mut();
                if ev.tenant_id == tenant_id
                    && matches!(ev.status, ChargeStatus::Pending | ChargeStatus::Posted)
                {
                    ev.status = ChargeStatus::Invoiced;
                    claimed.push(ev.clone());
                }
            }
        }
        claimed
    }

    /// Put voided-invoice events back into the billable pool.
    pub fn release_invoiced_events(&self, tenant_id: Uuid, ids: &[Uuid]) {
        for id in ids {
            if let Some(mut entry) = self.charge_events.get_mut(id) {
                let ev = entry.value_mut();
                if ev.tenant_id == tenant_id && ev.status == ChargeStatus::Invoiced {
                    ev.status = ChargeStatus::Pending;
                }
            }
        }
    }

    pub fn customers_with_billable_events(&self, tenant_id: Uuid) -> Vec<Uuid> {
        let mut customers: Vec<Uuid> = self
            .charge_events
            .iter()
            .filter(|e| {
                let ev = e.value();
                ev.tenant_id == tenant_id
                    && matches!(ev.status, ChargeStatus::Pending | ChargeStatus::Posted)
            })
            .map(|e| e.value().customer_id)
            .collect();
        customers.sort();
        customers.dedup();
        customers
    }

    // ------------------------------------------------------------------
    // Invoices
    // ------------------------------------------------------------------

    pub fn insert_invoice(&self, invoice: Invoice) {
        self.invoices.insert(invoice.id, invoice);
    }

    pub fn invoice(&self, tenant_id: Uuid, id: Uuid) -> Option<Invoice> {
        self.invoices
            .get(&id)
            .filter(|e| e.value().tenant_id == tenant_id)
            .map(|e| e.value().clone())
    }

    pub fn update_invoice(&self, invoice: Invoice) {
        self.invoices.insert(invoice.id, invoice);
    }

    pub fn invoices_for_customer(&self, tenant_id: Uuid, customer_id: Uuid) -> Vec<Invoice> {
        self.invoices
            .iter()
            .filter(|e| {
                e.value().tenant_id == tenant_id && e.value().customer_id == customer_id
            })
            .map(|e| e.value().clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Tenant billing config
    // ------------------------------------------------------------------

    pub fn set_tenant_config(&self, config: BillingModelConfig) {
        self.tenant_configs.insert(config.tenant_id, config);
    }

    pub fn tenant_config(&self, tenant_id: Uuid) -> Option<BillingModelConfig> {
        self.tenant_configs
            .get(&tenant_id)
            .map(|e| e.value().clone())
    }

    // ------------------------------------------------------------------
    // Packages
    // ------------------------------------------------------------------

    pub fn insert_package(&self, package: Package) {
        self.packages.insert(package.id, package);
    }

    pub fn package(&self, tenant_id: Uuid, id: Uuid) -> Option<Package> {
        self.packages
            .get(&id)
            .filter(|e| e.value().tenant_id == tenant_id)
            .map(|e| e.value().clone())
    }

    /// Packages past their free-storage window, not yet picked up, and not
    /// already charged today.
    pub fn packages_due_storage(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Vec<Package> {
        let mut due: Vec<Package> = self
            .packages
            .iter()
            .filter(|e| {
                let p = e.value();
                p.tenant_id == tenant_id
                    && !p.picked_up
                    && p.free_until < now
                    && p.last_storage_charged_on != Some(today)
            })
            .map(|e| e.value().clone())
            .collect();
        due.sort_by_key(|p| p.received_at);
        due
    }

    pub fn mark_storage_charged(&self, tenant_id: Uuid, package_id: Uuid, on: NaiveDate) {
        if let Some(mut entry) = self.packages.get_mut(&package_id) {
            if entry.value().tenant_id == tenant_id {
                entry.value_mut().last_storage_charged_on = Some(on);
            }
        }
    }

    pub fn mark_picked_up(&self, tenant_id: Uuid, package_id: Uuid) {
        if let Some(mut entry) = self.packages.get_mut(&package_id) {
            if entry.value().tenant_id == tenant_id {
                entry.value_mut().picked_up = true;
            }
        }
    }
}
