//! Invoice aggregation: sweeping billable charge events into invoices.
//!
//! Only `ChargeEvent` rows are ever aggregated; linked TOS charges are
//! marked along for the ride but never summed, so one economic event is
//! billed once. Invoice state machine:
//! `draft --send--> sent --record_payment--> paid`, and
//! `draft|sent --void--> void` (terminal, releasing the consumed events).

use crate::model::{Invoice, InvoiceLineItem};
use crate::store::BillingStore;
use crate::tos::TosRouter;
use chrono::{DateTime, Duration, Utc};
use mailroom_core::config::BillingConfig;
use mailroom_core::types::{ChargeStatus, InvoiceStatus};
use mailroom_core::{BillingError, BillingResult, Money};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Aggregation window and behavior knobs.
#[derive(Debug, Clone, Default)]
pub struct InvoiceOptions {
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    /// Create the invoice already `sent` instead of `draft`.
    pub auto_send: bool,
}

/// Per-customer failure inside the batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInvoiceError {
    pub customer_id: Uuid,
    pub message: String,
}

/// Batch summary: always returned, per-customer failures collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInvoiceResult {
    pub invoices_created: usize,
    pub total_amount: Money,
    pub errors: Vec<BatchInvoiceError>,
}

pub struct InvoiceAggregator {
    store: Arc<BillingStore>,
    tos: TosRouter,
    config: BillingConfig,
}

impl InvoiceAggregator {
    pub fn new(store: Arc<BillingStore>, config: BillingConfig) -> Self {
        Self {
            tos: TosRouter::new(Arc::clone(&store), config.clone()),
            store,
            config,
        }
    }

    /// Sweep a customer's billable charge events into one invoice.
    ///
    /// Returns `Ok(None)` when no eligible charges exist; "nothing to
    /// invoice" is an expected outcome, not an error.
    pub fn generate_invoice_for_customer(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        options: InvoiceOptions,
    ) -> BillingResult<Option<Invoice>> {
        let candidates = self.store.billable_events(
            tenant_id,
            customer_id,
            options.period_start,
            options.period_end,
        );
        if candidates.is_empty() {
            return Ok(None);
        }

        // Conditional flip: anything a concurrent aggregation already
        // consumed drops out here, so each event is invoiced exactly once.
        let ids: Vec<Uuid> = candidates.iter().map(|e| e.id).collect();
        let claimed = self.store.claim_events_for_invoice(tenant_id, &ids);
        if claimed.is_empty() {
            return Ok(None);
        }

        let items: Vec<InvoiceLineItem> = claimed
            .iter()
            .map(|event| InvoiceLineItem {
                charge_event_id: event.id,
                description: event.description.clone(),
                service_type: event.service_type,
                quantity: event.quantity,
                unit_price: event.unit_rate,
                amount: event.total_charge,
            })
            .collect();
        let amount: Money = items.iter().map(|i| i.amount).sum();

        let term_days = self
            .store
            .profile(tenant_id, customer_id)
            .and_then(|p| p.payment_term_days)
            .unwrap_or(self.config.tos_payment_window_days);

        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            tenant_id,
            customer_id,
            amount,
            status: if options.auto_send {
                InvoiceStatus::Sent
            } else {
                InvoiceStatus::Draft
            },
            due_date: now + Duration::days(term_days),
            items,
            period_start: options.period_start,
            period_end: options.period_end,
            sent_at: options.auto_send.then_some(now),
            paid_at: None,
            payment_method: None,
            payment_reference: None,
            created_at: now,
        };
        self.store.insert_invoice(invoice.clone());

        // Drag linked deferred TOS charges into `invoiced` for traceability.
        for event in &claimed {
            if let Some(tos_id) = event.tos_charge_id {
                if let Err(err) = self.tos.mark_invoiced(tenant_id, tos_id) {
                    warn!(
                        tenant_id = %tenant_id,
                        tos_charge_id = %tos_id,
                        error = %err,
                        "Linked TOS charge not marked invoiced"
                    );
                }
            }
        }

        info!(
            tenant_id = %tenant_id,
            customer_id = %customer_id,
            invoice_id = %invoice.id,
            amount = %invoice.amount,
            line_items = invoice.items.len(),
            "Invoice generated"
        );
        Ok(Some(invoice))
    }

    /// Invoice every customer with billable charges, tenant-wide.
    /// Per-customer failures never abort the run.
    pub fn generate_batch_invoices(
        &self,
        tenant_id: Uuid,
        options: InvoiceOptions,
    ) -> BatchInvoiceResult {
        let customers = self.store.customers_with_billable_events(tenant_id);
        let mut invoices_created = 0;
        let mut total_amount = Money::ZERO;
        let mut errors = Vec::new();

        for customer_id in customers {
            match self.generate_invoice_for_customer(tenant_id, customer_id, options.clone()) {
                Ok(Some(invoice)) => {
                    invoices_created += 1;
                    total_amount += invoice.amount;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        tenant_id = %tenant_id,
                        customer_id = %customer_id,
                        error = %err,
                        "Batch invoicing failed for customer"
                    );
                    errors.push(BatchInvoiceError {
                        customer_id,
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            tenant_id = %tenant_id,
            invoices_created,
            total_amount = %total_amount,
            failures = errors.len(),
            "Batch invoicing complete"
        );
        BatchInvoiceResult {
            invoices_created,
            total_amount,
            errors,
        }
    }

    /// `draft -> sent`.
    pub fn send_invoice(&self, tenant_id: Uuid, invoice_id: Uuid) -> BillingResult<Invoice> {
        let mut invoice = self.get(tenant_id, invoice_id)?;
        if invoice.status != InvoiceStatus::Draft {
            return Err(invalid_transition(&invoice, InvoiceStatus::Sent));
        }
        invoice.status = InvoiceStatus::Sent;
        invoice.sent_at = Some(Utc::now());
        self.store.update_invoice(invoice.clone());
        info!(tenant_id = %tenant_id, invoice_id = %invoice_id, "Invoice sent");
        Ok(invoice)
    }

    /// `draft|sent -> paid`. Rejected on already-paid or void invoices.
    pub fn record_invoice_payment(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        payment_method: &str,
        payment_reference: Option<&str>,
    ) -> BillingResult<Invoice> {
        let mut invoice = self.get(tenant_id, invoice_id)?;
        if !matches!(invoice.status, InvoiceStatus::Draft | InvoiceStatus::Sent) {
            return Err(invalid_transition(&invoice, InvoiceStatus::Paid));
        }
        invoice.status = InvoiceStatus::Paid;
        invoice.paid_at = Some(Utc::now());
        invoice.payment_method = Some(payment_method.to_string());
        invoice.payment_reference = payment_reference.map(str::to_string);
        self.store.update_invoice(invoice.clone());

        // Settle the consumed ledger rows and their TOS charges.
        for item in &invoice.items {
            if let Some(mut event) = self.store.charge_event(tenant_id, item.charge_event_id) {
                if event.status == ChargeStatus::Invoiced {
                    event.status = ChargeStatus::Paid;
                    let tos_id = event.tos_charge_id;
                    self.store.update_charge_event(event);
                    if let Some(tos_id) = tos_id {
                        if let Err(err) = self.tos.record_payment(tenant_id, tos_id, None) {
                            warn!(
                                tenant_id = %tenant_id,
                                tos_charge_id = %tos_id,
                                error = %err,
                                "Linked TOS charge not settled with invoice"
                            );
                        }
                    }
                }
            }
        }

        info!(
            tenant_id = %tenant_id,
            invoice_id = %invoice_id,
            amount = %invoice.amount,
            "Invoice payment recorded"
        );
        Ok(invoice)
    }

    /// `draft|sent -> void` (terminal). Consumed charge events go back into
    /// the billable pool.
    pub fn void_invoice(&self, tenant_id: Uuid, invoice_id: Uuid) -> BillingResult<Invoice> {
        let mut invoice = self.get(tenant_id, invoice_id)?;
        if !matches!(invoice.status, InvoiceStatus::Draft | InvoiceStatus::Sent) {
            return Err(invalid_transition(&invoice, InvoiceStatus::Void));
        }
        invoice.status = InvoiceStatus::Void;
        self.store.update_invoice(invoice.clone());

        let ids: Vec<Uuid> = invoice.items.iter().map(|i| i.charge_event_id).collect();
        self.store.release_invoiced_events(tenant_id, &ids);

        info!(tenant_id = %tenant_id, invoice_id = %invoice_id, "Invoice voided");
        Ok(invoice)
    }

    fn get(&self, tenant_id: Uuid, invoice_id: Uuid) -> BillingResult<Invoice> {
        self.store
            .invoice(tenant_id, invoice_id)
            .ok_or_else(|| BillingError::NotFound(format!("invoice {invoice_id}")))
    }
}

fn invalid_transition(invoice: &Invoice, to: InvoiceStatus) -> BillingError {
    BillingError::InvalidTransition {
        entity: "Invoice",
        from: invoice.status.to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charge::{ChargeGenerator, ChargeRequest};
    use crate::model::{BillingModelConfig, CustomerBillingProfile};
    use mailroom_core::config::BillingConfig;
    use mailroom_core::types::{ServiceType, TosMode};

    fn setup() -> (InvoiceAggregator, ChargeGenerator, Arc<BillingStore>, Uuid) {
        let store = Arc::new(BillingStore::new());
        let aggregator = InvoiceAggregator::new(Arc::clone(&store), BillingConfig::default());
        let generator = ChargeGenerator::new(Arc::clone(&store), BillingConfig::default());
        (aggregator, generator, store, Uuid::new_v4())
    }

    fn charge(
        generator: &ChargeGenerator,
        tenant: Uuid,
        customer: Uuid,
        cents: i64,
        description: &str,
    ) {
        generator
            .generate_charge_event(ChargeRequest {
                tenant_id: tenant,
                customer_id: customer,
                pmb_number: "PMB-7".into(),
                service_type: ServiceType::Scanning,
                description: description.into(),
                quantity: 1,
                unit_rate: Money::from_cents(cents),
                cost_basis: Money::ZERO,
                markup: Money::ZERO,
                payment_method_id: None,
                tos_mode_override: None,
                usage_meter_slug: None,
                idempotency_key: None,
            })
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_amount_equals_line_item_sum_and_events_flip_once() {
        let (aggregator, generator, store, tenant) = setup();
        let customer = Uuid::new_v4();
        charge(&generator, tenant, customer, 500, "Scan A");
        charge(&generator, tenant, customer, 750, "Scan B");
        charge(&generator, tenant, customer, 250, "Scan C");

        let invoice = aggregator
            .generate_invoice_for_customer(tenant, customer, InvoiceOptions::default())
            .unwrap()
            .unwrap();

        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.items.len(), 3);
        let item_sum: Money = invoice.items.iter().map(|i| i.amount).sum();
        assert_eq!(invoice.amount, item_sum);
        assert_eq!(invoice.amount, Money::from_cents(1500));

        // Every consumed event is now invoiced.
        for item in &invoice.items {
            let event = store.charge_event(tenant, item.charge_event_id).unwrap();
            assert_eq!(event.status, ChargeStatus::Invoiced);
        }

        // Second run: nothing left to invoice.
        let again = aggregator
            .generate_invoice_for_customer(tenant, customer, InvoiceOptions::default())
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn test_no_billable_charges_returns_none() {
        let (aggregator, _generator, _store, tenant) = setup();
        let result = aggregator
            .generate_invoice_for_customer(tenant, Uuid::new_v4(), InvoiceOptions::default())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_auto_send() {
        let (aggregator, generator, _store, tenant) = setup();
        let customer = Uuid::new_v4();
        charge(&generator, tenant, customer, 300, "Scan");
        let invoice = aggregator
            .generate_invoice_for_customer(
                tenant,
                customer,
                InvoiceOptions {
                    auto_send: true,
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Sent);
        assert!(invoice.sent_at.is_some());
    }

    #[test]
    fn test_state_machine_send_pay_and_terminal_rejections() {
        let (aggregator, generator, _store, tenant) = setup();
        let customer = Uuid::new_v4();
        charge(&generator, tenant, customer, 900, "Scan");
        let invoice = aggregator
            .generate_invoice_for_customer(tenant, customer, InvoiceOptions::default())
            .unwrap()
            .unwrap();

        let sent = aggregator.send_invoice(tenant, invoice.id).unwrap();
        assert_eq!(sent.status, InvoiceStatus::Sent);
        // Sending twice is a conflict.
        assert!(matches!(
            aggregator.send_invoice(tenant, invoice.id),
            Err(BillingError::InvalidTransition { .. })
        ));

        let paid = aggregator
            .record_invoice_payment(tenant, invoice.id, "check", Some("chk-1009"))
            .unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.payment_reference.as_deref(), Some("chk-1009"));

        assert!(matches!(
            aggregator.record_invoice_payment(tenant, invoice.id, "check", None),
            Err(BillingError::InvalidTransition { .. })
        ));
        assert!(matches!(
            aggregator.void_invoice(tenant, invoice.id),
            Err(BillingError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_invoice_payment_settles_events() {
        let (aggregator, generator, store, tenant) = setup();
        let customer = Uuid::new_v4();
        charge(&generator, tenant, customer, 400, "Scan");
        let invoice = aggregator
            .generate_invoice_for_customer(tenant, customer, InvoiceOptions::default())
            .unwrap()
            .unwrap();
        aggregator
            .record_invoice_payment(tenant, invoice.id, "card", None)
            .unwrap();

        let event = store
            .charge_event(tenant, invoice.items[0].charge_event_id)
            .unwrap();
        assert_eq!(event.status, ChargeStatus::Paid);
    }

    #[test]
    fn test_void_releases_events_for_reinvoicing() {
        let (aggregator, generator, _store, tenant) = setup();
        let customer = Uuid::new_v4();
        charge(&generator, tenant, customer, 650, "Scan");
        let invoice = aggregator
            .generate_invoice_for_customer(tenant, customer, InvoiceOptions::default())
            .unwrap()
            .unwrap();

        aggregator.void_invoice(tenant, invoice.id).unwrap();

        // The charge is billable again and lands on a fresh invoice.
        let second = aggregator
            .generate_invoice_for_customer(tenant, customer, InvoiceOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(second.amount, Money::from_cents(650));
        assert_ne!(second.id, invoice.id);
    }

    #[test]
    fn test_batch_invoices_per_customer() {
        let (aggregator, generator, store, tenant) = setup();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        charge(&generator, tenant, a, 100, "Scan");
        charge(&generator, tenant, a, 200, "Scan");
        charge(&generator, tenant, b, 300, "Scan");

        // A customer from another tenant must not leak into the batch.
        let other_tenant = Uuid::new_v4();
        charge(&generator, other_tenant, Uuid::new_v4(), 999, "Scan");

        let result = aggregator.generate_batch_invoices(tenant, InvoiceOptions::default());
        assert_eq!(result.invoices_created, 2);
        assert_eq!(result.total_amount, Money::from_cents(600));
        assert!(result.errors.is_empty());

        assert_eq!(store.invoices_for_customer(tenant, a).len(), 1);
        assert_eq!(store.invoices_for_customer(tenant, b).len(), 1);
    }

    #[test]
    fn test_deferred_tos_charges_follow_the_invoice() {
        let (aggregator, generator, store, tenant) = setup();
        let customer = Uuid::new_v4();
        let mut config = BillingModelConfig::new(tenant);
        config.tos_enabled = true;
        config.tos_default_mode = Some(TosMode::Deferred);
        store.set_tenant_config(config);
        store.upsert_profile(CustomerBillingProfile::new(tenant, customer));

        charge(&generator, tenant, customer, 1200, "Forwarding");
        let invoice = aggregator
            .generate_invoice_for_customer(tenant, customer, InvoiceOptions::default())
            .unwrap()
            .unwrap();

        let event = store
            .charge_event(tenant, invoice.items[0].charge_event_id)
            .unwrap();
        let tos = store.tos_charge(tenant, event.tos_charge_id.unwrap()).unwrap();
        assert_eq!(
            tos.status,
            mailroom_core::types::TosChargeStatus::Invoiced
        );

        // Paying the invoice settles the TOS charge and releases the balance.
        aggregator
            .record_invoice_payment(tenant, invoice.id, "ach", None)
            .unwrap();
        let tos = store.tos_charge(tenant, tos.id).unwrap();
        assert_eq!(tos.status, mailroom_core::types::TosChargeStatus::Paid);
        assert_eq!(
            store.profile(tenant, customer).unwrap().account_balance,
            Money::ZERO
        );
    }
}
