//! Persisted billing entities.
//!
//! Every entity belongs to exactly one tenant (`tenant_id`); customer-scoped
//! entities additionally belong to exactly one customer. Nothing is shared
//! across tenants.

use crate::rates::RateTier;
use chrono::{DateTime, NaiveDate, Utc};
use mailroom_core::types::{
    ChargeStatus, InvoiceStatus, OveragePolicy, QuotaService, ServiceType, TosChargeStatus, TosMode,
};
use mailroom_core::{Money, Period};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant-scoped named quantity unit with a tiered price schedule.
/// `slug` is unique per tenant; soft-deleted via `is_active = false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageMeter {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub slug: String,
    pub name: String,
    pub rate_tiers: Vec<RateTier>,
    /// Units per period billed at zero before the tier walk begins.
    pub included_quantity: u64,
    /// Usage ceiling per period; 0 = unlimited.
    pub hard_limit: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An immutable append-only usage fact. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub meter_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub quantity: u64,
    /// Tiered cost of this record's slice of the period's running total.
    pub unit_cost: Money,
    pub period: Period,
    pub recorded_at: DateTime<Utc>,
}

/// Running per-customer quota counters for one billing period. One row per
/// `(tenant, customer, period)`; counters only ever increase within a period
/// and reset by starting a fresh row on rollover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmbQuotaUsage {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub period: Period,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub mail_items_used: u64,
    pub scans_used: u64,
    pub storage_days_used: u64,
    pub forwarding_used: u64,
    pub shredding_used: u64,
    pub packages_received: u64,
    pub updated_at: DateTime<Utc>,
}

impl PmbQuotaUsage {
    pub fn new(tenant_id: Uuid, customer_id: Uuid, period: Period) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            customer_id,
            period,
            period_start: period.start(),
            period_end: period.end(),
            mail_items_used: 0,
            scans_used: 0,
            storage_days_used: 0,
            forwarding_used: 0,
            shredding_used: 0,
            packages_received: 0,
            updated_at: now,
        }
    }

    pub fn counter(&self, service: QuotaService) -> u64 {
        match service {
            QuotaService::MailItems => self.mail_items_used,
            QuotaService::Scans => self.scans_used,
            QuotaService::StorageDays => self.storage_days_used,
            QuotaService::Forwarding => self.forwarding_used,
            QuotaService::Shredding => self.shredding_used,
            QuotaService::PackagesReceived => self.packages_received,
        }
    }

    pub fn counter_mut(&mut self, service: QuotaService) -> &mut u64 {
        match service {
            QuotaService::MailItems => &mut self.mail_items_used,
            QuotaService::Scans => &mut self.scans_used,
            QuotaService::StorageDays => &mut self.storage_days_used,
            QuotaService::Forwarding => &mut self.forwarding_used,
            QuotaService::Shredding => &mut self.shredding_used,
            QuotaService::PackagesReceived => &mut self.packages_received,
        }
    }
}

/// Per-customer billing configuration and deferred-charge liability.
///
/// `account_balance` is mutated only by the TOS router's deferred path
/// (reserve on create, settle on payment, release on void).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerBillingProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub tos_mode: Option<TosMode>,
    /// Ceiling on outstanding deferred charges; zero = no limit.
    pub credit_limit: Money,
    pub account_balance: Money,
    pub payment_term_days: Option<i64>,
    pub auto_pay_enabled: bool,
    pub auto_pay_day: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerBillingProfile {
    pub fn new(tenant_id: Uuid, customer_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            customer_id,
            tos_mode: None,
            credit_limit: Money::ZERO,
            account_balance: Money::ZERO,
            payment_term_days: None,
            auto_pay_enabled: false,
            auto_pay_day: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One time-of-service charge. Immutable once `paid` or `void`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TosCharge {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub description: String,
    pub amount: Money,
    pub tax: Money,
    /// `amount + tax`.
    pub total: Money,
    pub status: TosChargeStatus,
    pub mode: TosMode,
    pub payment_method_id: Option<String>,
    /// Deferred charges only.
    pub due_date: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Back-link to the charge event that spawned this charge, if any.
    pub charge_event_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The canonical ledger row for any billable service action. Only charge
/// events are ever aggregated into invoices; linked TOS charges and usage
/// records exist for traceability, not for invoicing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub pmb_number: String,
    pub service_type: ServiceType,
    pub description: String,
    pub quantity: u64,
    pub unit_rate: Money,
    pub cost_basis: Money,
    pub markup: Money,
    /// `cost_basis + markup` when either is non-zero, else `quantity * unit_rate`.
    pub total_charge: Money,
    pub status: ChargeStatus,
    pub tos_charge_id: Option<Uuid>,
    pub usage_record_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub void_reason: Option<String>,
    pub voided_by: Option<Uuid>,
    pub voided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A snapshotted invoice line, frozen at aggregation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub charge_event_id: Uuid,
    pub description: String,
    pub service_type: ServiceType,
    pub quantity: u64,
    pub unit_price: Money,
    pub amount: Money,
}

/// A billable document aggregating charge events for one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Money,
    pub status: InvoiceStatus,
    pub due_date: DateTime<Utc>,
    pub items: Vec<InvoiceLineItem>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Which billing models a tenant runs, plus default policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingModelConfig {
    pub tenant_id: Uuid,
    pub subscriptions_enabled: bool,
    pub metered_usage_enabled: bool,
    pub tos_enabled: bool,
    pub overage_policy: OveragePolicy,
    pub tos_default_mode: Option<TosMode>,
    pub tos_payment_window_days: i64,
    pub updated_at: DateTime<Utc>,
}

impl BillingModelConfig {
    pub fn new(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            subscriptions_enabled: true,
            metered_usage_enabled: false,
            tos_enabled: false,
            overage_policy: OveragePolicy::Charge,
            tos_default_mode: None,
            tos_payment_window_days: 30,
            updated_at: Utc::now(),
        }
    }
}

/// A received package, tracked for the daily storage-charge batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub pmb_number: String,
    pub description: String,
    pub received_at: DateTime<Utc>,
    /// Storage is free until this instant; daily charges accrue after.
    pub free_until: DateTime<Utc>,
    pub picked_up: bool,
    /// Calendar day of the last storage charge, the batch's dedupe anchor.
    pub last_storage_charged_on: Option<NaiveDate>,
}
