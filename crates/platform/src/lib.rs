//! Platform capabilities shared across the billing engine: multi-tenancy,
//! tamper-evident audit logging, and customer notifications.

pub mod audit;
pub mod notify;
pub mod tenancy;

pub use audit::AuditLogger;
pub use notify::{Notification, Notifier, TracingNotifier};
pub use tenancy::TenantDirectory;
