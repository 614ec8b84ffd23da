//! Time-of-service charge routing.
//!
//! A TOS charge is billed the moment a service is rendered, either captured
//! immediately against a payment method or deferred onto the customer's
//! account. Deferred charges pass through the store's atomic credit gate and
//! are the only writer of `CustomerBillingProfile.account_balance`.
//!
//! Per-charge state machine: `pending -> {paid | invoiced -> paid} | void`;
//! `paid` and `void` are terminal.

use crate::model::{CustomerBillingProfile, TosCharge};
use crate::store::BillingStore;
use chrono::{DateTime, Duration, Utc};
use mailroom_core::config::BillingConfig;
use mailroom_core::types::{ChargeStatus, TosChargeStatus, TosMode};
use mailroom_core::{BillingError, BillingResult, Money};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Input for all three TOS entry points.
#[derive(Debug, Clone)]
pub struct TosChargeRequest {
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub description: String,
    pub amount: Money,
    pub tax: Money,
    pub payment_method_id: Option<String>,
    /// Explicit mode override; wins over profile and tenant defaults.
    pub mode_override: Option<TosMode>,
    /// Back-link to the originating charge event, if any.
    pub charge_event_id: Option<Uuid>,
    /// Dedupe key: a retried call with the same key returns the original
    /// charge instead of creating a second one.
    pub idempotency_key: Option<String>,
}

pub struct TosRouter {
    store: Arc<BillingStore>,
    config: BillingConfig,
}

impl TosRouter {
    pub fn new(store: Arc<BillingStore>, config: BillingConfig) -> Self {
        Self { store, config }
    }

    /// Route a charge through the customer's configured payment path.
    /// Mode priority: request override, then customer profile, then tenant
    /// default, then the platform default.
    pub fn process_charge_via_tos(&self, request: TosChargeRequest) -> BillingResult<TosCharge> {
        let mode = self.resolve_mode(&request);
        match mode {
            TosMode::Immediate => self.process_immediate_charge(request),
            TosMode::Deferred => self.process_deferred_charge(request),
        }
    }

    /// Capture payment at the point of service. Requires a payment method;
    /// no credit-limit check applies since nothing is owed afterwards.
    pub fn process_immediate_charge(&self, request: TosChargeRequest) -> BillingResult<TosCharge> {
        validate_amounts(&request)?;
        if let Some(existing) = self.dedupe(&request) {
            return Ok(existing);
        }
        if request.payment_method_id.is_none() {
            return Err(BillingError::Validation(
                "immediate TOS charge requires a payment method".into(),
            ));
        }

        let now = Utc::now();
        let charge = TosCharge {
            id: Uuid::new_v4(),
            tenant_id: request.tenant_id,
            customer_id: request.customer_id,
            description: request.description,
            amount: request.amount,
            tax: request.tax,
            total: request.amount + request.tax,
            status: TosChargeStatus::Paid,
            mode: TosMode::Immediate,
            payment_method_id: request.payment_method_id,
            due_date: None,
            paid_at: Some(now),
            charge_event_id: request.charge_event_id,
            idempotency_key: request.idempotency_key,
            created_at: now,
        };
        self.store.insert_tos_charge(charge.clone());
        info!(
            tenant_id = %charge.tenant_id,
            customer_id = %charge.customer_id,
            total = %charge.total,
            "Immediate TOS charge captured"
        );
        Ok(charge)
    }

    /// Defer the charge onto the customer's account. Runs the atomic credit
    /// gate: on rejection no charge row is created and the balance is
    /// untouched.
    pub fn process_deferred_charge(&self, request: TosChargeRequest) -> BillingResult<TosCharge> {
        validate_amounts(&request)?;
        if let Some(existing) = self.dedupe(&request) {
            return Ok(existing);
        }

        let profile = self.profile(request.tenant_id, request.customer_id)?;
        let term_days = profile
            .payment_term_days
            .or_else(|| {
                self.store
                    .tenant_config(request.tenant_id)
                    .map(|c| c.tos_payment_window_days)
            })
            .unwrap_or(self.config.tos_payment_window_days);

        let now = Utc::now();
        let charge = TosCharge {
            id: Uuid::new_v4(),
            tenant_id: request.tenant_id,
            customer_id: request.customer_id,
            description: request.description,
            amount: request.amount,
            tax: request.tax,
            total: request.amount + request.tax,
            status: TosChargeStatus::Pending,
            mode: TosMode::Deferred,
            payment_method_id: request.payment_method_id,
            due_date: Some(now + Duration::days(term_days)),
            paid_at: None,
            charge_event_id: request.charge_event_id,
            idempotency_key: request.idempotency_key,
            created_at: now,
        };

        let charge = self.store.create_deferred_charge(charge)?;
        info!(
            tenant_id = %charge.tenant_id,
            customer_id = %charge.customer_id,
            total = %charge.total,
            due_date = ?charge.due_date,
            "Deferred TOS charge accepted"
        );
        Ok(charge)
    }

    /// Re-attempt payment capture for a pending charge whose earlier capture
    /// failed. The due date and credit accounting are untouched; the charge
    /// already counted against the limit when it was created.
    pub fn retry_failed_charge(
        &self,
        tenant_id: Uuid,
        charge_id: Uuid,
        payment_method_id: Option<String>,
    ) -> BillingResult<TosCharge> {
        let charge = self.get(tenant_id, charge_id)?;
        if charge.status != TosChargeStatus::Pending {
            return Err(invalid_transition(&charge, TosChargeStatus::Paid));
        }
        if payment_method_id.is_none() && charge.payment_method_id.is_none() {
            return Err(BillingError::Validation(
                "retry requires a payment method".into(),
            ));
        }
        let mut charge = charge;
        if payment_method_id.is_some() {
            charge.payment_method_id = payment_method_id;
        }
        warn!(
            tenant_id = %tenant_id,
            charge_id = %charge_id,
            "Retrying failed TOS capture"
        );
        self.settle(charge, Utc::now())
    }

    /// Record payment for a pending or invoiced charge.
    pub fn record_payment(
        &self,
        tenant_id: Uuid,
        charge_id: Uuid,
        paid_at: Option<DateTime<Utc>>,
    ) -> BillingResult<TosCharge> {
        let charge = self.get(tenant_id, charge_id)?;
        if !matches!(
            charge.status,
            TosChargeStatus::Pending | TosChargeStatus::Invoiced
        ) {
            return Err(invalid_transition(&charge, TosChargeStatus::Paid));
        }
        self.settle(charge, paid_at.unwrap_or_else(Utc::now))
    }

    /// Mark a pending charge as swept into an invoice. It keeps counting
    /// against the credit limit until paid.
    pub fn mark_invoiced(&self, tenant_id: Uuid, charge_id: Uuid) -> BillingResult<TosCharge> {
        let mut charge = self.get(tenant_id, charge_id)?;
        if charge.status != TosChargeStatus::Pending {
            return Err(invalid_transition(&charge, TosChargeStatus::Invoiced));
        }
        charge.status = TosChargeStatus::Invoiced;
        self.store.apply_tos_update(charge, Money::ZERO)
    }

    /// Void a charge. Terminal; deferred voids release the reserved balance.
    pub fn void_charge(&self, tenant_id: Uuid, charge_id: Uuid) -> BillingResult<TosCharge> {
        let mut charge = self.get(tenant_id, charge_id)?;
        if !matches!(
            charge.status,
            TosChargeStatus::Pending | TosChargeStatus::Invoiced
        ) {
            return Err(invalid_transition(&charge, TosChargeStatus::Void));
        }
        let release = if charge.mode == TosMode::Deferred {
            -charge.total
        } else {
            Money::ZERO
        };
        charge.status = TosChargeStatus::Void;
        let charge = self.store.apply_tos_update(charge, release)?;
        info!(tenant_id = %tenant_id, charge_id = %charge_id, "TOS charge voided");
        Ok(charge)
    }

    fn settle(&self, mut charge: TosCharge, paid_at: DateTime<Utc>) -> BillingResult<TosCharge> {
        let release = if charge.mode == TosMode::Deferred {
            -charge.total
        } else {
            Money::ZERO
        };
        charge.status = TosChargeStatus::Paid;
        charge.paid_at = Some(paid_at);
        let charge = self.store.apply_tos_update(charge, release)?;
        // Settle the originating ledger row too, so a directly-paid TOS
        // charge can never be swept into a later invoice.
        if let Some(event_id) = charge.charge_event_id {
            if let Some(mut event) = self.store.charge_event(charge.tenant_id, event_id) {
                if matches!(
                    event.status,
                    ChargeStatus::Pending | ChargeStatus::Posted | ChargeStatus::Invoiced
                ) {
                    event.status = ChargeStatus::Paid;
                    self.store.update_charge_event(event);
                }
            }
        }
        info!(
            tenant_id = %charge.tenant_id,
            charge_id = %charge.id,
            total = %charge.total,
            "TOS charge paid"
        );
        Ok(charge)
    }

    fn resolve_mode(&self, request: &TosChargeRequest) -> TosMode {
        if let Some(mode) = request.mode_override {
            return mode;
        }
        if let Some(mode) = self
            .store
            .profile(request.tenant_id, request.customer_id)
            .and_then(|p| p.tos_mode)
        {
            return mode;
        }
        if let Some(mode) = self
            .store
            .tenant_config(request.tenant_id)
            .and_then(|c| c.tos_default_mode)
        {
            return mode;
        }
        self.config.tos_default_mode
    }

    fn dedupe(&self, request: &TosChargeRequest) -> Option<TosCharge> {
        let key = request.idempotency_key.as_deref()?;
        let existing =
            self.store
                .tos_by_idempotency_key(request.tenant_id, request.customer_id, key)?;
        info!(
            tenant_id = %request.tenant_id,
            customer_id = %request.customer_id,
            idempotency_key = %key,
            "Duplicate TOS charge request, returning existing charge"
        );
        Some(existing)
    }

    fn get(&self, tenant_id: Uuid, charge_id: Uuid) -> BillingResult<TosCharge> {
        self.store
            .tos_charge(tenant_id, charge_id)
            .ok_or_else(|| BillingError::NotFound(format!("TOS charge {charge_id}")))
    }

    fn profile(&self, tenant_id: Uuid, customer_id: Uuid) -> BillingResult<CustomerBillingProfile> {
        self.store.profile(tenant_id, customer_id).ok_or_else(|| {
            BillingError::NotFound(format!("billing profile for customer {customer_id}"))
        })
    }
}

fn validate_amounts(request: &TosChargeRequest) -> BillingResult<()> {
    if !request.amount.is_positive() {
        return Err(BillingError::Validation(
            "TOS charge amount must be positive".into(),
        ));
    }
    if request.tax < Money::ZERO {
        return Err(BillingError::Validation("TOS tax cannot be negative".into()));
    }
    Ok(())
}

fn invalid_transition(charge: &TosCharge, to: TosChargeStatus) -> BillingError {
    BillingError::InvalidTransition {
        entity: "TosCharge",
        from: charge.status.to_string(),
        to: to.to_string(),
    }
}
