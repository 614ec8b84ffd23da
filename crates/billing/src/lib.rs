//! Billing and charge computation engine for Mailroom.
//!
//! Turns physical service actions (package receiving, storage, forwarding,
//! shipment creation) into monetary charges under three coexisting billing
//! models (flat subscriptions, metered usage with tiered rates, and
//! time-of-service charges, immediate or deferred against a credit limit)
//! and aggregates those charges into invoices.
//!
//! Every engine takes an injected `Arc<BillingStore>`; nothing here owns a
//! global handle. All store queries are tenant-scoped.

pub mod charge;
pub mod invoice;
pub mod metering;
pub mod model;
pub mod proration;
pub mod quota;
pub mod rates;
pub mod store;
pub mod tos;

pub use charge::ChargeGenerator;
pub use invoice::InvoiceAggregator;
pub use metering::UsageLedger;
pub use quota::QuotaTracker;
pub use store::BillingStore;
pub use tos::TosRouter;
