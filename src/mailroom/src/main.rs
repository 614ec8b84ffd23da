//! Mailroom — multi-tenant billing engine for postal retail and virtual
//! mailbox operators.
//!
//! Entry point that wires the billing engines together and runs one demo
//! billing cycle end to end: metered usage, time-of-service charges, the
//! daily storage batch, and invoice aggregation.

use chrono::{Duration, Utc};
use clap::Parser;
use mailroom_billing::charge::ChargeRequest;
use mailroom_billing::invoice::InvoiceOptions;
use mailroom_billing::model::{BillingModelConfig, CustomerBillingProfile, Package};
use mailroom_billing::rates::RateTier;
use mailroom_billing::{
    BillingStore, ChargeGenerator, InvoiceAggregator, QuotaTracker, UsageLedger,
};
use mailroom_core::config::AppConfig;
use mailroom_core::types::{PlanQuota, QuotaService, ServiceType, TosMode};
use mailroom_core::Money;
use mailroom_platform::notify::NotificationKind;
use mailroom_platform::{AuditLogger, Notification, Notifier, TenantDirectory, TracingNotifier};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "mailroom")]
#[command(about = "Multi-tenant billing engine for postal retail operators")]
#[command(version)]
struct Cli {
    /// Instance identifier (overrides config)
    #[arg(long, env = "MAILROOM__INSTANCE_ID")]
    instance_id: Option<String>,

    /// Daily storage rate in cents (overrides config)
    #[arg(long, env = "MAILROOM__BILLING__DAILY_STORAGE_RATE_CENTS")]
    storage_rate_cents: Option<i64>,

    /// Skip the demo billing cycle (wire engines and exit)
    #[arg(long, default_value_t = false)]
    no_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailroom=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Mailroom billing engine starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(instance_id) = cli.instance_id {
        config.instance_id = instance_id;
    }
    if let Some(rate) = cli.storage_rate_cents {
        config.billing.daily_storage_rate_cents = rate;
    }

    info!(
        instance_id = %config.instance_id,
        tos_default_mode = ?config.billing.tos_default_mode,
        storage_rate_cents = config.billing.daily_storage_rate_cents,
        free_storage_days = config.billing.free_storage_days,
        "Configuration loaded"
    );

    let store = Arc::new(BillingStore::new());
    let directory = Arc::new(TenantDirectory::new());
    let audit = Arc::new(AuditLogger::new());
    let notifier = TracingNotifier;

    let ledger = UsageLedger::new(Arc::clone(&store), config.billing.clone());
    let quota = QuotaTracker::new(Arc::clone(&store));
    let generator = ChargeGenerator::new(Arc::clone(&store), config.billing.clone());
    let aggregator = InvoiceAggregator::new(Arc::clone(&store), config.billing.clone());

    if cli.no_demo {
        info!("Engines wired, exiting (--no-demo)");
        return Ok(());
    }

    // ── Demo billing cycle ──────────────────────────────────────────────

    let tenant = directory.create_tenant("Harborview Mail Center", "America/New_York");
    let mut tenant_config = BillingModelConfig::new(tenant.id);
    tenant_config.metered_usage_enabled = true;
    tenant_config.tos_enabled = true;
    tenant_config.tos_default_mode = Some(TosMode::Deferred);
    store.set_tenant_config(tenant_config);

    let customer = directory.create_customer(
        tenant.id,
        "PMB-142",
        "Rivera Imports LLC",
        Some("billing@riveraimports.example".into()),
    )?;
    let plan = PlanQuota {
        included_scans: 20,
        included_packages: 10,
        overage_scan_rate: Money::from_cents(50),
        overage_package_rate: Money::from_cents(150),
        ..Default::default()
    };
    directory.assign_plan(tenant.id, customer.id, "business", plan.clone())?;

    let mut profile = CustomerBillingProfile::new(tenant.id, customer.id);
    profile.credit_limit = Money::from_dollars(200.0);
    store.upsert_profile(profile);

    // Tiered scan meter: first 100 free, then 10c, then 5c past 1000.
    ledger.create_meter(
        tenant.id,
        "scan-pages",
        "Scan pages",
        vec![
            RateTier { up_to: Some(100), rate: 0.0 },
            RateTier { up_to: Some(1000), rate: 0.10 },
            RateTier { up_to: None, rate: 0.05 },
        ],
        100,
        0,
    )?;
    let usage = ledger.record_usage(tenant.id, "scan-pages", 150, Some(customer.id))?;
    info!(unit_cost = %usage.unit_cost, "Metered scan usage recorded");

    // A counter-side scanning job, charged via TOS against the credit limit.
    let outcome = generator.generate_charge_event(ChargeRequest {
        tenant_id: tenant.id,
        customer_id: customer.id,
        pmb_number: "PMB-142".into(),
        service_type: ServiceType::Scanning,
        description: "Document scan bundle".into(),
        quantity: 25,
        unit_rate: Money::from_cents(50),
        cost_basis: Money::ZERO,
        markup: Money::ZERO,
        payment_method_id: None,
        tos_mode_override: None,
        usage_meter_slug: None,
        idempotency_key: Some(format!("demo:scan:{}", customer.id)),
    })?;
    if let Some(outcome) = &outcome {
        audit.record_best_effort(
            tenant.id,
            None,
            "charge.create",
            "charge_event",
            &outcome.charge_event.id.to_string(),
            &outcome.charge_event,
        );
        info!(
            charge_event_id = %outcome.charge_event.id,
            total = %outcome.charge_event.total_charge,
            "Charge event generated"
        );
    }

    // Two packages past the free window, picked up late.
    for n in 0..2 {
        store.insert_package(Package {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            customer_id: customer.id,
            pmb_number: "PMB-142".into(),
            description: format!("Inbound parcel {}", n + 1),
            received_at: Utc::now() - Duration::days(config.billing.free_storage_days + 3),
            free_until: Utc::now() - Duration::days(3),
            picked_up: false,
            last_storage_charged_on: None,
        });
    }
    let storage = generator.generate_daily_storage_charges(tenant.id);
    info!(
        charges_created = storage.charges_created,
        failures = storage.errors.len(),
        "Daily storage batch complete"
    );

    quota.record(tenant.id, customer.id, QuotaService::PackagesReceived, 2);
    let report = quota.quota_status(tenant.id, customer.id, &plan);
    for service in &report.services {
        if service.used > 0 {
            info!(
                service = %service.service,
                used = service.used,
                included = service.included,
                overage = service.overage,
                "Quota position"
            );
        }
        if service.overage > 0 {
            notifier.notify(Notification::new(
                tenant.id,
                customer.id,
                NotificationKind::QuotaExceeded,
                &format!("{} quota exceeded", service.service),
                &format!(
                    "{} of {} included {} used this period.",
                    service.used, service.included, service.service
                ),
            ));
        }
    }

    let batch = aggregator.generate_batch_invoices(tenant.id, InvoiceOptions::default());
    info!(
        invoices_created = batch.invoices_created,
        total_amount = %batch.total_amount,
        failures = batch.errors.len(),
        "Invoice batch complete"
    );
    for invoice in store.invoices_for_customer(tenant.id, customer.id) {
        audit.record_best_effort(
            tenant.id,
            None,
            "invoice.create",
            "invoice",
            &invoice.id.to_string(),
            &invoice,
        );
        info!(
            invoice_id = %invoice.id,
            amount = %invoice.amount,
            line_items = invoice.items.len(),
            due_date = %invoice.due_date,
            "Invoice ready"
        );
    }

    let outstanding = store.outstanding_total(tenant.id, customer.id);
    info!(outstanding = %outstanding, "Customer deferred balance");

    let chain = audit.verify_chain();
    info!(
        audit_events = chain.total_events,
        chain_intact = chain.chain_intact,
        "Demo billing cycle complete"
    );

    Ok(())
}
