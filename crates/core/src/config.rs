use crate::types::{OveragePolicy, TosMode};
use serde::Deserialize;

/// Root application configuration. Loaded from environment variables with the
/// prefix `MAILROOM__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
    #[serde(default)]
    pub billing: BillingConfig,
}

/// Platform-wide billing defaults, applied when a tenant's own
/// `BillingModelConfig` does not override them.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// TOS mode used when neither the request, the customer profile, nor the
    /// tenant config names one.
    #[serde(default = "default_tos_mode")]
    pub tos_default_mode: TosMode,
    /// Payment term for deferred charges, in days.
    #[serde(default = "default_payment_window_days")]
    pub tos_payment_window_days: i64,
    #[serde(default = "default_overage_policy")]
    pub overage_policy: OveragePolicy,
    /// Days a received package sits before daily storage charges accrue.
    #[serde(default = "default_free_storage_days")]
    pub free_storage_days: i64,
    /// Daily storage rate in cents, used by the storage batch job.
    #[serde(default = "default_storage_rate_cents")]
    pub daily_storage_rate_cents: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            instance_id: default_instance_id(),
            billing: BillingConfig::default(),
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            tos_default_mode: default_tos_mode(),
            tos_payment_window_days: default_payment_window_days(),
            overage_policy: default_overage_policy(),
            free_storage_days: default_free_storage_days(),
            daily_storage_rate_cents: default_storage_rate_cents(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("MAILROOM")
                .separator("__")
                .try_parsing(true),
        );
        let config = builder.build()?;
        config.try_deserialize()
    }
}

fn default_instance_id() -> String {
    "mailroom-0".to_string()
}

fn default_tos_mode() -> TosMode {
    TosMode::Immediate
}

fn default_payment_window_days() -> i64 {
    30
}

fn default_overage_policy() -> OveragePolicy {
    OveragePolicy::Charge
}

fn default_free_storage_days() -> i64 {
    5
}

fn default_storage_rate_cents() -> i64 {
    200
}
