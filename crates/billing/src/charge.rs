//! Charge event generation: the single entry point every billable service
//! action funnels through.
//!
//! A service action becomes a `ChargeEvent` ledger row and, depending on
//! the tenant's enabled billing models, a linked TOS charge and/or usage
//! record for the same economic event. Only charge events are ever swept
//! into invoices, so the linkage adds traceability without double-counting.
//!
//! The write order is fixed: charge event first, then linked rows. A failure
//! in a linked write unwinds the rows written so far and surfaces the error.

use crate::metering::UsageLedger;
use crate::model::ChargeEvent;
use crate::quota::QuotaTracker;
use crate::store::BillingStore;
use crate::tos::{TosChargeRequest, TosRouter};
use chrono::Utc;
use mailroom_core::config::BillingConfig;
use mailroom_core::types::{ChargeStatus, QuotaService, ServiceType, TosChargeStatus, TosMode};
use mailroom_core::{BillingError, BillingResult, Money};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Input for a single charge generation.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub pmb_number: String,
    pub service_type: ServiceType,
    pub description: String,
    pub quantity: u64,
    pub unit_rate: Money,
    pub cost_basis: Money,
    pub markup: Money,
    pub payment_method_id: Option<String>,
    pub tos_mode_override: Option<TosMode>,
    /// Route the same quantity through this usage meter when the tenant has
    /// metered billing enabled.
    pub usage_meter_slug: Option<String>,
    pub idempotency_key: Option<String>,
}

impl ChargeRequest {
    /// `cost_basis + markup` when either is set, else `quantity * unit_rate`.
    pub fn total_charge(&self) -> Money {
        if !self.cost_basis.is_zero() || !self.markup.is_zero() {
            self.cost_basis + self.markup
        } else {
            self.unit_rate * self.quantity
        }
    }
}

/// What a successful generation produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeOutcome {
    pub charge_event: ChargeEvent,
    pub tos_charge_id: Option<Uuid>,
    pub usage_record_id: Option<Uuid>,
}

/// Per-package failure inside the storage batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageChargeError {
    pub package_id: Uuid,
    pub pmb_number: String,
    pub message: String,
}

/// Batch summary: the batch always completes, failures are collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageBatchResult {
    pub charges_created: usize,
    pub errors: Vec<StorageChargeError>,
}

pub struct ChargeGenerator {
    store: Arc<BillingStore>,
    tos: TosRouter,
    ledger: UsageLedger,
    quota: QuotaTracker,
    config: BillingConfig,
}

impl ChargeGenerator {
    pub fn new(store: Arc<BillingStore>, config: BillingConfig) -> Self {
        Self {
            tos: TosRouter::new(Arc::clone(&store), config.clone()),
            ledger: UsageLedger::new(Arc::clone(&store), config.clone()),
            quota: QuotaTracker::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    /// Generate the ledger row (and linked rows) for one service action.
    ///
    /// Returns `Ok(None)` without any side effect when the computed charge is
    /// exactly zero; free-tier actions never pollute the ledger.
    pub fn generate_charge_event(
        &self,
        request: ChargeRequest,
    ) -> BillingResult<Option<ChargeOutcome>> {
        validate(&request)?;

        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) =
                self.store
                    .event_by_idempotency_key(request.tenant_id, request.customer_id, key)
            {
                info!(
                    tenant_id = %request.tenant_id,
                    idempotency_key = %key,
                    "Duplicate charge request, returning existing event"
                );
                return Ok(Some(ChargeOutcome {
                    tos_charge_id: existing.tos_charge_id,
                    usage_record_id: existing.usage_record_id,
                    charge_event: existing,
                }));
            }
        }

        let total_charge = request.total_charge();
        if total_charge.is_zero() {
            return Ok(None);
        }

        let mut event = ChargeEvent {
            id: Uuid::new_v4(),
            tenant_id: request.tenant_id,
            customer_id: request.customer_id,
            pmb_number: request.pmb_number.clone(),
            service_type: request.service_type,
            description: request.description.clone(),
            quantity: request.quantity,
            unit_rate: request.unit_rate,
            cost_basis: request.cost_basis,
            markup: request.markup,
            total_charge,
            status: ChargeStatus::Pending,
            tos_charge_id: None,
            usage_record_id: None,
            idempotency_key: request.idempotency_key.clone(),
            void_reason: None,
            voided_by: None,
            voided_at: None,
            created_at: Utc::now(),
        };
        self.store.insert_charge_event(event.clone());

        let tenant_config = self.store.tenant_config(request.tenant_id);
        let metered = tenant_config
            .as_ref()
            .map(|c| c.metered_usage_enabled)
            .unwrap_or(false);
        let tos_enabled = tenant_config
            .as_ref()
            .map(|c| c.tos_enabled)
            .unwrap_or(false);

        // Linked usage record.
        let mut usage_record_id = None;
        if metered {
            if let Some(slug) = request.usage_meter_slug.as_deref() {
                match self.ledger.record_usage(
                    request.tenant_id,
                    slug,
                    request.quantity,
                    Some(request.customer_id),
                ) {
                    Ok(record) => usage_record_id = Some(record.id),
                    Err(err) => {
                        self.store.remove_charge_event(request.tenant_id, event.id);
                        return Err(err);
                    }
                }
            }
        }

        // Linked TOS charge.
        let mut tos_charge_id = None;
        if tos_enabled {
            let tos_request = TosChargeRequest {
                tenant_id: request.tenant_id,
                customer_id: request.customer_id,
                description: request.description.clone(),
                amount: total_charge,
                tax: Money::ZERO,
                payment_method_id: request.payment_method_id.clone(),
                mode_override: request.tos_mode_override,
                charge_event_id: Some(event.id),
                idempotency_key: request
                    .idempotency_key
                    .as_ref()
                    .map(|k| format!("{k}:tos")),
            };
            match self.tos.process_charge_via_tos(tos_request) {
                Ok(charge) => {
                    tos_charge_id = Some(charge.id);
                    if charge.status == TosChargeStatus::Paid {
                        // Captured at the counter; keep it out of invoicing.
                        event.status = ChargeStatus::Paid;
                    }
                }
                Err(err) => {
                    if let Some(record_id) = usage_record_id {
                        self.store
                            .remove_usage_record(request.tenant_id, record_id);
                    }
                    self.store.remove_charge_event(request.tenant_id, event.id);
                    return Err(err);
                }
            }
        }

        event.tos_charge_id = tos_charge_id;
        event.usage_record_id = usage_record_id;
        self.store.update_charge_event(event.clone());

        if let Some(service) = quota_service_for(request.service_type) {
            self.quota
                .record(request.tenant_id, request.customer_id, service, request.quantity);
        }

        info!(
            tenant_id = %request.tenant_id,
            customer_id = %request.customer_id,
            service = %request.service_type,
            total = %total_charge,
            "Charge event generated"
        );
        Ok(Some(ChargeOutcome {
            charge_event: event,
            tos_charge_id,
            usage_record_id,
        }))
    }

    /// Void a charge event. Requires a reason; terminal once applied.
    pub fn void_charge_event(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        voided_by: Uuid,
        reason: Option<&str>,
    ) -> BillingResult<ChargeEvent> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| BillingError::Validation("void requires a reason".into()))?;

        let mut event = self
            .store
            .charge_event(tenant_id, event_id)
            .ok_or_else(|| BillingError::NotFound(format!("charge event {event_id}")))?;

        if !matches!(
            event.status,
            ChargeStatus::Pending | ChargeStatus::Posted | ChargeStatus::Disputed
        ) {
            return Err(BillingError::InvalidTransition {
                entity: "ChargeEvent",
                from: event.status.to_string(),
                to: ChargeStatus::Void.to_string(),
            });
        }

        event.status = ChargeStatus::Void;
        event.void_reason = Some(reason.to_string());
        event.voided_by = Some(voided_by);
        event.voided_at = Some(Utc::now());
        self.store.update_charge_event(event.clone());

        // Void the linked TOS charge too, if it is still voidable.
        if let Some(tos_id) = event.tos_charge_id {
            if let Err(err) = self.tos.void_charge(tenant_id, tos_id) {
                error!(
                    tenant_id = %tenant_id,
                    tos_charge_id = %tos_id,
                    error = %err,
                    "Linked TOS charge could not be voided"
                );
            }
        }

        info!(tenant_id = %tenant_id, event_id = %event_id, "Charge event voided");
        Ok(event)
    }

    /// Move a charge event between the working statuses. Terminal and
    /// aggregator-managed statuses are rejected; use the dedicated paths.
    pub fn update_charge_status(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        new_status: ChargeStatus,
    ) -> BillingResult<ChargeEvent> {
        let mut event = self
            .store
            .charge_event(tenant_id, event_id)
            .ok_or_else(|| BillingError::NotFound(format!("charge event {event_id}")))?;

        let allowed = matches!(
            (event.status, new_status),
            (ChargeStatus::Pending, ChargeStatus::Posted)
                | (ChargeStatus::Pending, ChargeStatus::Disputed)
                | (ChargeStatus::Posted, ChargeStatus::Disputed)
                | (ChargeStatus::Disputed, ChargeStatus::Posted)
        );
        if !allowed {
            return Err(BillingError::InvalidTransition {
                entity: "ChargeEvent",
                from: event.status.to_string(),
                to: new_status.to_string(),
            });
        }

        event.status = new_status;
        self.store.update_charge_event(event.clone());
        Ok(event)
    }

    /// Charge one day of storage for every package past its free window.
    ///
    /// Per-package failures are collected, never propagated: the batch
    /// always completes and reports what it managed. The per-package,
    /// per-day idempotency key makes cron re-runs safe.
    pub fn generate_daily_storage_charges(&self, tenant_id: Uuid) -> StorageBatchResult {
        let now = Utc::now();
        let today = now.date_naive();
        let rate = Money::from_cents(self.config.daily_storage_rate_cents);
        let due = self.store.packages_due_storage(tenant_id, now, today);

        let mut charges_created = 0;
        let mut errors = Vec::new();

        for package in due {
            let request = ChargeRequest {
                tenant_id,
                customer_id: package.customer_id,
                pmb_number: package.pmb_number.clone(),
                service_type: ServiceType::Storage,
                description: format!("Daily storage: {}", package.description),
                quantity: 1,
                unit_rate: rate,
                cost_basis: Money::ZERO,
                markup: Money::ZERO,
                payment_method_id: None,
                tos_mode_override: None,
                usage_meter_slug: None,
                idempotency_key: Some(format!("storage:{}:{}", package.id, today)),
            };
            match self.generate_charge_event(request) {
                Ok(Some(_)) => {
                    self.store.mark_storage_charged(tenant_id, package.id, today);
                    charges_created += 1;
                }
                Ok(None) => {
                    // Zero storage rate: nothing to bill today.
                }
                Err(err) => {
                    error!(
                        tenant_id = %tenant_id,
                        package_id = %package.id,
                        error = %err,
                        "Storage charge failed for package"
                    );
                    errors.push(StorageChargeError {
                        package_id: package.id,
                        pmb_number: package.pmb_number.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            tenant_id = %tenant_id,
            charges_created,
            failures = errors.len(),
            "Daily storage batch complete"
        );
        StorageBatchResult {
            charges_created,
            errors,
        }
    }
}

fn validate(request: &ChargeRequest) -> BillingResult<()> {
    if request.pmb_number.trim().is_empty() {
        return Err(BillingError::Validation("PMB number is required".into()));
    }
    if request.description.trim().is_empty() {
        return Err(BillingError::Validation("description is required".into()));
    }
    if request.unit_rate < Money::ZERO
        || request.cost_basis < Money::ZERO
        || request.markup < Money::ZERO
    {
        return Err(BillingError::Validation(
            "monetary inputs cannot be negative".into(),
        ));
    }
    Ok(())
}

/// Which quota counter a service action consumes, if any.
fn quota_service_for(service: ServiceType) -> Option<QuotaService> {
    match service {
        ServiceType::Receiving => Some(QuotaService::PackagesReceived),
        ServiceType::Storage => Some(QuotaService::StorageDays),
        ServiceType::Forwarding => Some(QuotaService::Forwarding),
        ServiceType::Scanning => Some(QuotaService::Scans),
        ServiceType::Disposal => Some(QuotaService::Shredding),
        ServiceType::Pickup | ServiceType::Shipping | ServiceType::Custom => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BillingModelConfig, CustomerBillingProfile, Package};
    use chrono::Duration;

    fn setup() -> (ChargeGenerator, Arc<BillingStore>, Uuid, Uuid) {
        let store = Arc::new(BillingStore::new());
        let generator = ChargeGenerator::new(Arc::clone(&store), BillingConfig::default());
        (generator, store, Uuid::new_v4(), Uuid::new_v4())
    }

    fn request(tenant: Uuid, customer: Uuid) -> ChargeRequest {
        ChargeRequest {
            tenant_id: tenant,
            customer_id: customer,
            pmb_number: "PMB-101".into(),
            service_type: ServiceType::Forwarding,
            description: "Forward 2 parcels".into(),
            quantity: 2,
            unit_rate: Money::from_cents(450),
            cost_basis: Money::ZERO,
            markup: Money::ZERO,
            payment_method_id: None,
            tos_mode_override: None,
            usage_meter_slug: None,
            idempotency_key: None,
        }
    }

    #[test]
    fn test_total_from_quantity_times_rate() {
        let (generator, _store, tenant, customer) = setup();
        let outcome = generator
            .generate_charge_event(request(tenant, customer))
            .unwrap()
            .unwrap();
        assert_eq!(outcome.charge_event.total_charge, Money::from_cents(900));
        assert_eq!(outcome.charge_event.status, ChargeStatus::Pending);
    }

    #[test]
    fn test_cost_basis_plus_markup_wins_over_unit_rate() {
        let (generator, _store, tenant, customer) = setup();
        let mut req = request(tenant, customer);
        req.cost_basis = Money::from_cents(1200);
        req.markup = Money::from_cents(300);
        let outcome = generator.generate_charge_event(req).unwrap().unwrap();
        assert_eq!(outcome.charge_event.total_charge, Money::from_cents(1500));
    }

    #[test]
    fn test_zero_charge_short_circuit_persists_nothing() {
        let (generator, store, tenant, customer) = setup();
        let mut req = request(tenant, customer);
        req.unit_rate = Money::ZERO;
        let outcome = generator.generate_charge_event(req).unwrap();
        assert!(outcome.is_none());
        assert!(store.customers_with_billable_events(tenant).is_empty());
        // No quota bump either.
        assert!(store
            .quota_row(tenant, customer, mailroom_core::Period::current())
            .is_none());
    }

    #[test]
    fn test_quota_counter_bumped_for_mapped_services() {
        let (generator, store, tenant, customer) = setup();
        let mut req = request(tenant, customer);
        req.service_type = ServiceType::Scanning;
        req.description = "Scan 3 letters".into();
        req.quantity = 3;
        generator.generate_charge_event(req).unwrap().unwrap();

        let row = store
            .quota_row(tenant, customer, mailroom_core::Period::current())
            .unwrap();
        assert_eq!(row.scans_used, 3);
    }

    #[test]
    fn test_tos_immediate_link_marks_event_paid() {
        let (generator, store, tenant, customer) = setup();
        let mut config = BillingModelConfig::new(tenant);
        config.tos_enabled = true;
        store.set_tenant_config(config);
        store.upsert_profile(CustomerBillingProfile::new(tenant, customer));

        let mut req = request(tenant, customer);
        req.payment_method_id = Some("pm_counter".into());
        let outcome = generator.generate_charge_event(req).unwrap().unwrap();

        let tos_id = outcome.tos_charge_id.unwrap();
        let tos = store.tos_charge(tenant, tos_id).unwrap();
        assert_eq!(tos.status, TosChargeStatus::Paid);
        assert_eq!(tos.charge_event_id, Some(outcome.charge_event.id));
        // Paid at the counter: must not be invoiced later.
        assert_eq!(outcome.charge_event.status, ChargeStatus::Paid);
        assert!(store.billable_events(tenant, customer, None, None).is_empty());
    }

    #[test]
    fn test_tos_deferred_link_keeps_event_billable() {
        let (generator, store, tenant, customer) = setup();
        let mut config = BillingModelConfig::new(tenant);
        config.tos_enabled = true;
        config.tos_default_mode = Some(TosMode::Deferred);
        store.set_tenant_config(config);
        store.upsert_profile(CustomerBillingProfile::new(tenant, customer));

        let outcome = generator
            .generate_charge_event(request(tenant, customer))
            .unwrap()
            .unwrap();
        assert_eq!(outcome.charge_event.status, ChargeStatus::Pending);
        assert_eq!(
            store.profile(tenant, customer).unwrap().account_balance,
            Money::from_cents(900)
        );
    }

    #[test]
    fn test_credit_rejection_unwinds_the_event() {
        let (generator, store, tenant, customer) = setup();
        let mut config = BillingModelConfig::new(tenant);
        config.tos_enabled = true;
        config.tos_default_mode = Some(TosMode::Deferred);
        store.set_tenant_config(config);
        let mut profile = CustomerBillingProfile::new(tenant, customer);
        profile.credit_limit = Money::from_cents(500);
        store.upsert_profile(profile);

        let err = generator
            .generate_charge_event(request(tenant, customer))
            .unwrap_err();
        assert!(matches!(err, BillingError::CreditLimitExceeded { .. }));
        // Nothing left behind.
        assert!(store.billable_events(tenant, customer, None, None).is_empty());
        assert_eq!(
            store.profile(tenant, customer).unwrap().account_balance,
            Money::ZERO
        );
    }

    #[test]
    fn test_usage_meter_link() {
        let (generator, store, tenant, customer) = setup();
        let mut config = BillingModelConfig::new(tenant);
        config.metered_usage_enabled = true;
        store.set_tenant_config(config);

        let ledger = UsageLedger::new(Arc::clone(&store), BillingConfig::default());
        ledger
            .create_meter(
                tenant,
                "forwarding",
                "Forwarding",
                vec![crate::rates::RateTier {
                    up_to: None,
                    rate: 0.25,
                }],
                0,
                0,
            )
            .unwrap();

        let mut req = request(tenant, customer);
        req.usage_meter_slug = Some("forwarding".into());
        let outcome = generator.generate_charge_event(req).unwrap().unwrap();
        let record_id = outcome.usage_record_id.unwrap();
        assert_eq!(outcome.charge_event.usage_record_id, Some(record_id));
    }

    #[test]
    fn test_idempotency_key_returns_existing() {
        let (generator, store, tenant, customer) = setup();
        let mut req = request(tenant, customer);
        req.idempotency_key = Some("forward-42".into());

        let first = generator
            .generate_charge_event(req.clone())
            .unwrap()
            .unwrap();
        let second = generator.generate_charge_event(req).unwrap().unwrap();
        assert_eq!(first.charge_event.id, second.charge_event.id);
        assert_eq!(store.billable_events(tenant, customer, None, None).len(), 1);
    }

    #[test]
    fn test_void_requires_reason_and_is_terminal() {
        let (generator, _store, tenant, customer) = setup();
        let actor = Uuid::new_v4();
        let outcome = generator
            .generate_charge_event(request(tenant, customer))
            .unwrap()
            .unwrap();
        let event_id = outcome.charge_event.id;

        assert!(matches!(
            generator.void_charge_event(tenant, event_id, actor, None),
            Err(BillingError::Validation(_))
        ));
        assert!(matches!(
            generator.void_charge_event(tenant, event_id, actor, Some("  ")),
            Err(BillingError::Validation(_))
        ));

        let voided = generator
            .void_charge_event(tenant, event_id, actor, Some("duplicate entry"))
            .unwrap();
        assert_eq!(voided.status, ChargeStatus::Void);
        assert_eq!(voided.void_reason.as_deref(), Some("duplicate entry"));
        assert_eq!(voided.voided_by, Some(actor));
        assert!(voided.voided_at.is_some());

        // No further transitions from void.
        assert!(matches!(
            generator.update_charge_status(tenant, event_id, ChargeStatus::Posted),
            Err(BillingError::InvalidTransition { .. })
        ));
        assert!(matches!(
            generator.void_charge_event(tenant, event_id, actor, Some("again")),
            Err(BillingError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_status_walk_pending_posted_disputed() {
        let (generator, _store, tenant, customer) = setup();
        let outcome = generator
            .generate_charge_event(request(tenant, customer))
            .unwrap()
            .unwrap();
        let id = outcome.charge_event.id;

        let posted = generator
            .update_charge_status(tenant, id, ChargeStatus::Posted)
            .unwrap();
        assert_eq!(posted.status, ChargeStatus::Posted);
        let disputed = generator
            .update_charge_status(tenant, id, ChargeStatus::Disputed)
            .unwrap();
        assert_eq!(disputed.status, ChargeStatus::Disputed);
        // Paid is aggregator/TOS-managed, not reachable here.
        assert!(matches!(
            generator.update_charge_status(tenant, id, ChargeStatus::Paid),
            Err(BillingError::InvalidTransition { .. })
        ));
    }

    fn seed_package(store: &BillingStore, tenant: Uuid, customer: Uuid, n: usize) -> Package {
        let now = Utc::now();
        let package = Package {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            customer_id: customer,
            pmb_number: format!("PMB-{n}"),
            description: format!("Box #{n}"),
            received_at: now - Duration::days(10),
            free_until: now - Duration::days(5),
            picked_up: false,
            last_storage_charged_on: None,
        };
        store.insert_package(package.clone());
        package
    }

    #[test]
    fn test_storage_batch_collects_failures_and_completes() {
        let (generator, store, tenant, _) = setup();

        // Tenant defers TOS charges; customer #6 has a tiny credit limit and
        // no headroom, so their storage charge is rejected.
        let mut config = BillingModelConfig::new(tenant);
        config.tos_enabled = true;
        config.tos_default_mode = Some(TosMode::Deferred);
        store.set_tenant_config(config);

        let mut failing_pmb = String::new();
        for n in 1..=10 {
            let customer = Uuid::new_v4();
            let mut profile = CustomerBillingProfile::new(tenant, customer);
            if n == 6 {
                profile.credit_limit = Money::from_cents(1);
            }
            store.upsert_profile(profile);
            let package = seed_package(&store, tenant, customer, n);
            if n == 6 {
                failing_pmb = package.pmb_number.clone();
            }
        }

        let result = generator.generate_daily_storage_charges(tenant);
        assert_eq!(result.charges_created, 9);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].pmb_number, failing_pmb);
        assert!(result.errors[0].message.contains("Credit limit"));
    }

    #[test]
    fn test_storage_batch_rerun_is_idempotent() {
        let (generator, store, tenant, _) = setup();
        let customer = Uuid::new_v4();
        store.upsert_profile(CustomerBillingProfile::new(tenant, customer));
        seed_package(&store, tenant, customer, 1);

        let first = generator.generate_daily_storage_charges(tenant);
        assert_eq!(first.charges_created, 1);

        // Same day, run again: the package is already marked charged.
        let second = generator.generate_daily_storage_charges(tenant);
        assert_eq!(second.charges_created, 0);
        assert_eq!(store.billable_events(tenant, customer, None, None).len(), 1);
    }

    #[test]
    fn test_storage_batch_skips_picked_up_and_free_window() {
        let (generator, store, tenant, _) = setup();
        let customer = Uuid::new_v4();
        store.upsert_profile(CustomerBillingProfile::new(tenant, customer));

        let picked_up = seed_package(&store, tenant, customer, 1);
        store.mark_picked_up(tenant, picked_up.id);

        let now = Utc::now();
        store.insert_package(Package {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            customer_id: customer,
            pmb_number: "PMB-2".into(),
            description: "Fresh box".into(),
            received_at: now,
            free_until: now + Duration::days(5),
            picked_up: false,
            last_storage_charged_on: None,
        });

        let result = generator.generate_daily_storage_charges(tenant);
        assert_eq!(result.charges_created, 0);
        assert!(result.errors.is_empty());
    }
}
