use crate::money::Money;
use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A deferred time-of-service charge would push the customer past their
    /// credit limit. Recoverable; carries the figures the caller needs to
    /// explain the rejection.
    #[error(
        "Credit limit exceeded: outstanding {outstanding} + charge {charge_amount} \
         over limit {credit_limit}"
    )]
    CreditLimitExceeded {
        outstanding: Money,
        credit_limit: Money,
        charge_amount: Money,
    },

    /// A meter with a hard limit and `block` overage policy refused new usage.
    #[error(
        "Usage limit exceeded on meter '{meter}': {current} + {requested} \
         over hard limit {hard_limit}"
    )]
    UsageLimitExceeded {
        meter: String,
        current: u64,
        requested: u64,
        hard_limit: u64,
    },

    /// Attempted state-machine move that the entity does not permit
    /// (e.g. voiding an already-void charge).
    #[error("Invalid transition for {entity}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
