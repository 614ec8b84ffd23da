//! Service, status, and billing-mode enumerations plus plan quota definitions.
//!
//! The `snake_case` wire names on these enums are a persisted-data contract:
//! existing rows store them as strings, so renames are breaking changes.

use crate::error::BillingError;
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of billable service action behind a charge event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Receiving,
    Storage,
    Forwarding,
    Scanning,
    Pickup,
    Disposal,
    Shipping,
    Custom,
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Receiving => "receiving",
            Self::Storage => "storage",
            Self::Forwarding => "forwarding",
            Self::Scanning => "scanning",
            Self::Pickup => "pickup",
            Self::Disposal => "disposal",
            Self::Shipping => "shipping",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the six plan-quota counters tracked per customer per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaService {
    MailItems,
    Scans,
    StorageDays,
    Forwarding,
    Shredding,
    PackagesReceived,
}

impl QuotaService {
    pub const ALL: [QuotaService; 6] = [
        Self::MailItems,
        Self::Scans,
        Self::StorageDays,
        Self::Forwarding,
        Self::Shredding,
        Self::PackagesReceived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MailItems => "mail_items",
            Self::Scans => "scans",
            Self::StorageDays => "storage_days",
            Self::Forwarding => "forwarding",
            Self::Shredding => "shredding",
            Self::PackagesReceived => "packages_received",
        }
    }
}

impl fmt::Display for QuotaService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotaService {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mail_items" => Ok(Self::MailItems),
            "scans" => Ok(Self::Scans),
            "storage_days" => Ok(Self::StorageDays),
            "forwarding" => Ok(Self::Forwarding),
            "shredding" => Ok(Self::Shredding),
            "packages_received" => Ok(Self::PackagesReceived),
            other => Err(BillingError::Validation(format!(
                "unknown quota service '{other}'"
            ))),
        }
    }
}

/// Charge event ledger status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Pending,
    Posted,
    Invoiced,
    Paid,
    Void,
    Disputed,
}

impl fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Posted => "posted",
            Self::Invoiced => "invoiced",
            Self::Paid => "paid",
            Self::Void => "void",
            Self::Disputed => "disputed",
        };
        f.write_str(s)
    }
}

/// Time-of-service charge status. A failed capture attempt leaves the charge
/// `pending` (still counting against the credit limit) for retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TosChargeStatus {
    Pending,
    Invoiced,
    Paid,
    Void,
}

impl fmt::Display for TosChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Invoiced => "invoiced",
            Self::Paid => "paid",
            Self::Void => "void",
        };
        f.write_str(s)
    }
}

/// Whether a time-of-service charge is captured at the counter or deferred
/// against the customer's credit limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TosMode {
    Immediate,
    Deferred,
}

/// Invoice lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Void,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Void => "void",
        };
        f.write_str(s)
    }
}

/// What happens when usage would pass a meter's hard limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OveragePolicy {
    /// Refuse the usage record outright.
    Block,
    /// Record it; the caller bills the overage separately.
    Charge,
    /// Record it and notify, bill nothing extra.
    AlertOnly,
}

/// A plan tier's included quantities and overage rates for the six quota
/// services. Quota overage is priced at read time against these fields;
/// nothing derived is persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanQuota {
    pub included_mail_items: u64,
    pub included_scans: u64,
    pub included_storage_days: u64,
    pub included_forwarding: u64,
    pub included_shredding: u64,
    pub included_packages: u64,
    pub overage_mail_item_rate: Money,
    pub overage_scan_rate: Money,
    pub overage_storage_day_rate: Money,
    pub overage_forwarding_rate: Money,
    pub overage_shredding_rate: Money,
    pub overage_package_rate: Money,
}

impl PlanQuota {
    pub fn included_for(&self, service: QuotaService) -> u64 {
        match service {
            QuotaService::MailItems => self.included_mail_items,
            QuotaService::Scans => self.included_scans,
            QuotaService::StorageDays => self.included_storage_days,
            QuotaService::Forwarding => self.included_forwarding,
            QuotaService::Shredding => self.included_shredding,
            QuotaService::PackagesReceived => self.included_packages,
        }
    }

    pub fn overage_rate_for(&self, service: QuotaService) -> Money {
        match service {
            QuotaService::MailItems => self.overage_mail_item_rate,
            QuotaService::Scans => self.overage_scan_rate,
            QuotaService::StorageDays => self.overage_storage_day_rate,
            QuotaService::Forwarding => self.overage_forwarding_rate,
            QuotaService::Shredding => self.overage_shredding_rate,
            QuotaService::PackagesReceived => self.overage_package_rate,
        }
    }
}
