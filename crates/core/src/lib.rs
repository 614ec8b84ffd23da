//! Domain vocabulary for Mailroom, a multi-tenant postal-retail platform.
//!
//! Pure types shared by every crate: integer-cent money, billing periods,
//! service and status enums, plan quotas, errors, and app configuration.
//! No I/O lives here.

pub mod config;
pub mod error;
pub mod money;
pub mod period;
pub mod types;

pub use config::AppConfig;
pub use error::{BillingError, BillingResult};
pub use money::Money;
pub use period::Period;
