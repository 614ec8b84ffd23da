//! End-to-end billing cycle: service actions become charge events, charge
//! events become an invoice, and payment settles everything back down.

use chrono::{Duration, Utc};
use mailroom_billing::charge::{ChargeGenerator, ChargeRequest};
use mailroom_billing::invoice::{InvoiceAggregator, InvoiceOptions};
use mailroom_billing::model::{BillingModelConfig, CustomerBillingProfile, Package};
use mailroom_billing::rates::RateTier;
use mailroom_billing::store::BillingStore;
use mailroom_billing::{QuotaTracker, UsageLedger};
use mailroom_core::config::BillingConfig;
use mailroom_core::types::{
    ChargeStatus, InvoiceStatus, PlanQuota, QuotaService, ServiceType, TosChargeStatus, TosMode,
};
use mailroom_core::Money;
use mailroom_platform::tenancy::TenantDirectory;
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    store: Arc<BillingStore>,
    directory: TenantDirectory,
    ledger: UsageLedger,
    quota: QuotaTracker,
    generator: ChargeGenerator,
    aggregator: InvoiceAggregator,
}

fn harness() -> Harness {
    let store = Arc::new(BillingStore::new());
    Harness {
        directory: TenantDirectory::new(),
        ledger: UsageLedger::new(Arc::clone(&store), BillingConfig::default()),
        quota: QuotaTracker::new(Arc::clone(&store)),
        generator: ChargeGenerator::new(Arc::clone(&store), BillingConfig::default()),
        aggregator: InvoiceAggregator::new(Arc::clone(&store), BillingConfig::default()),
        store,
    }
}

fn scan_request(tenant: Uuid, customer: Uuid, cents: i64, quantity: u64) -> ChargeRequest {
    ChargeRequest {
        tenant_id: tenant,
        customer_id: customer,
        pmb_number: "PMB-142".into(),
        service_type: ServiceType::Scanning,
        description: "Document scan".into(),
        quantity,
        unit_rate: Money::from_cents(cents),
        cost_basis: Money::ZERO,
        markup: Money::ZERO,
        payment_method_id: None,
        tos_mode_override: None,
        usage_meter_slug: None,
        idempotency_key: None,
    }
}

#[test]
fn full_billing_cycle_from_service_action_to_paid_invoice() {
    let h = harness();
    let tenant = h.directory.create_tenant("Harborview Mail Center", "UTC");

    let mut config = BillingModelConfig::new(tenant.id);
    config.metered_usage_enabled = true;
    config.tos_enabled = true;
    config.tos_default_mode = Some(TosMode::Deferred);
    h.store.set_tenant_config(config);

    let customer = h
        .directory
        .create_customer(tenant.id, "PMB-142", "Rivera Imports LLC", None)
        .unwrap();
    let mut profile = CustomerBillingProfile::new(tenant.id, customer.id);
    profile.credit_limit = Money::from_dollars(500.0);
    h.store.upsert_profile(profile);

    // Two counter services and two storage days' worth of packages.
    h.generator
        .generate_charge_event(scan_request(tenant.id, customer.id, 50, 25))
        .unwrap()
        .unwrap();
    h.generator
        .generate_charge_event(ChargeRequest {
            service_type: ServiceType::Forwarding,
            description: "Mail forwarding".into(),
            quantity: 1,
            unit_rate: Money::from_cents(895),
            ..scan_request(tenant.id, customer.id, 0, 1)
        })
        .unwrap()
        .unwrap();
    h.store.insert_package(Package {
        id: Uuid::new_v4(),
        tenant_id: tenant.id,
        customer_id: customer.id,
        pmb_number: "PMB-142".into(),
        description: "Inbound parcel".into(),
        received_at: Utc::now() - Duration::days(8),
        free_until: Utc::now() - Duration::days(3),
        picked_up: false,
        last_storage_charged_on: None,
    });
    let storage = h.generator.generate_daily_storage_charges(tenant.id);
    assert_eq!(storage.charges_created, 1);
    assert!(storage.errors.is_empty());

    // $12.50 + $8.95 + $2.00 deferred against the credit limit.
    let outstanding = h.store.outstanding_total(tenant.id, customer.id);
    assert_eq!(outstanding, Money::from_cents(1250 + 895 + 200));

    let invoice = h
        .aggregator
        .generate_invoice_for_customer(tenant.id, customer.id, InvoiceOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(invoice.items.len(), 3);
    assert_eq!(invoice.amount, Money::from_cents(2345));
    let item_sum: Money = invoice.items.iter().map(|i| i.amount).sum();
    assert_eq!(invoice.amount, item_sum);

    // Nothing billable remains after the sweep.
    assert!(h
        .aggregator
        .generate_invoice_for_customer(tenant.id, customer.id, InvoiceOptions::default())
        .unwrap()
        .is_none());

    let paid = h
        .aggregator
        .record_invoice_payment(tenant.id, invoice.id, "check", Some("chk-2205"))
        .unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);

    // Payment settles every event and TOS charge, releasing the balance.
    for item in &invoice.items {
        let event = h.store.charge_event(tenant.id, item.charge_event_id).unwrap();
        assert_eq!(event.status, ChargeStatus::Paid);
        let tos = h
            .store
            .tos_charge(tenant.id, event.tos_charge_id.unwrap())
            .unwrap();
        assert_eq!(tos.status, TosChargeStatus::Paid);
    }
    assert_eq!(
        h.store.outstanding_total(tenant.id, customer.id),
        Money::ZERO
    );
    assert_eq!(
        h.store
            .profile(tenant.id, customer.id)
            .unwrap()
            .account_balance,
        Money::ZERO
    );
}

#[test]
fn metered_usage_flows_into_the_charge_event() {
    let h = harness();
    let tenant = h.directory.create_tenant("Operator", "UTC");
    let mut config = BillingModelConfig::new(tenant.id);
    config.metered_usage_enabled = true;
    h.store.set_tenant_config(config);

    let customer = h
        .directory
        .create_customer(tenant.id, "PMB-9", "Holder", None)
        .unwrap();

    h.ledger
        .create_meter(
            tenant.id,
            "scan-pages",
            "Scan pages",
            vec![
                RateTier {
                    up_to: Some(100),
                    rate: 0.0,
                },
                RateTier {
                    up_to: None,
                    rate: 0.10,
                },
            ],
            100,
            0,
        )
        .unwrap();

    // 150 pages: first 100 free, 50 at 10c.
    let outcome = h
        .generator
        .generate_charge_event(ChargeRequest {
            usage_meter_slug: Some("scan-pages".into()),
            quantity: 150,
            unit_rate: Money::ZERO,
            cost_basis: Money::from_cents(500),
            markup: Money::ZERO,
            ..scan_request(tenant.id, customer.id, 0, 150)
        })
        .unwrap()
        .unwrap();

    let record_id = outcome.usage_record_id.unwrap();
    let record = h.store.usage_record(tenant.id, record_id).unwrap();
    assert_eq!(record.quantity, 150);
    assert_eq!(record.unit_cost, Money::from_dollars(5.0));
    assert_eq!(
        h.ledger
            .period_usage(tenant.id, "scan-pages", mailroom_core::Period::current())
            .unwrap(),
        150
    );
}

#[test]
fn quota_counters_track_charged_services() {
    let h = harness();
    let tenant = h.directory.create_tenant("Operator", "UTC");
    let customer = h
        .directory
        .create_customer(tenant.id, "PMB-3", "Holder", None)
        .unwrap();
    let plan = PlanQuota {
        included_scans: 10,
        overage_scan_rate: Money::from_cents(50),
        ..Default::default()
    };
    h.directory
        .assign_plan(tenant.id, customer.id, "starter", plan.clone())
        .unwrap();

    h.generator
        .generate_charge_event(scan_request(tenant.id, customer.id, 50, 12))
        .unwrap()
        .unwrap();

    let report = h.quota.quota_status(tenant.id, customer.id, &plan);
    let scans = report
        .services
        .iter()
        .find(|s| s.service == QuotaService::Scans)
        .unwrap();
    assert_eq!(scans.used, 12);
    assert_eq!(scans.overage, 2);
    assert_eq!(scans.overage_rate, Money::from_cents(50));
}
