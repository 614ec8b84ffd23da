//! Multi-tenancy: mailroom operators, their PMB customers, and plan
//! assignment.
//!
//! A tenant is one mailroom operator (a store location or franchise); a
//! customer is one private mailbox holder at that operator. Every lookup is
//! tenant-scoped, so one operator can never touch another operator's
//! mailboxes.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mailroom_core::types::PlanQuota;
use mailroom_core::{BillingError, BillingResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Tenant lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
    Cancelled,
}

/// A mailroom operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: TenantStatus,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer account status at an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Active,
    Suspended,
    Closed,
}

/// A private mailbox holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub pmb_number: String,
    pub name: String,
    pub email: Option<String>,
    pub status: CustomerStatus,
    pub plan_name: Option<String>,
    /// Included quantities and overage rates from the assigned plan.
    pub plan_quota: PlanQuota,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tenant and customer directory backed by DashMap.
pub struct TenantDirectory {
    tenants: DashMap<Uuid, Tenant>,
    customers: DashMap<Uuid, Customer>,
}

impl Default for TenantDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantDirectory {
    pub fn new() -> Self {
        Self {
            tenants: DashMap::new(),
            customers: DashMap::new(),
        }
    }

    /// Register a mailroom operator.
    pub fn create_tenant(&self, name: &str, timezone: &str) -> Tenant {
        let now = Utc::now();
        let slug = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug,
            status: TenantStatus::Active,
            timezone: timezone.to_string(),
            created_at: now,
            updated_at: now,
        };
        info!(tenant_id = %tenant.id, tenant_name = %tenant.name, "Tenant created");
        self.tenants.insert(tenant.id, tenant.clone());
        tenant
    }

    pub fn get_tenant(&self, id: Uuid) -> Option<Tenant> {
        self.tenants.get(&id).map(|e| e.value().clone())
    }

    pub fn list_tenants(&self) -> Vec<Tenant> {
        self.tenants.iter().map(|e| e.value().clone()).collect()
    }

    pub fn suspend_tenant(&self, id: Uuid) -> Option<Tenant> {
        self.set_tenant_status(id, TenantStatus::Suspended)
    }

    pub fn reactivate_tenant(&self, id: Uuid) -> Option<Tenant> {
        self.set_tenant_status(id, TenantStatus::Active)
    }

    fn set_tenant_status(&self, id: Uuid, status: TenantStatus) -> Option<Tenant> {
        if let Some(mut entry) = self.tenants.get_mut(&id) {
            entry.status = status;
            entry.updated_at = Utc::now();
            info!(tenant_id = %id, status = ?status, "Tenant status changed");
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Open a mailbox for a customer at the given operator.
    pub fn create_customer(
        &self,
        tenant_id: Uuid,
        pmb_number: &str,
        name: &str,
        email: Option<String>,
    ) -> BillingResult<Customer> {
        if self.get_tenant(tenant_id).is_none() {
            return Err(BillingError::NotFound(format!("tenant {tenant_id}")));
        }
        if pmb_number.trim().is_empty() {
            return Err(BillingError::Validation("pmb_number is required".into()));
        }
        let duplicate = self.customers.iter().any(|e| {
            let c = e.value();
            c.tenant_id == tenant_id
                && c.pmb_number == pmb_number
                && c.status != CustomerStatus::Closed
        });
        if duplicate {
            return Err(BillingError::Validation(format!(
                "PMB {pmb_number} is already assigned"
            )));
        }

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            tenant_id,
            pmb_number: pmb_number.to_string(),
            name: name.to_string(),
            email,
            status: CustomerStatus::Active,
            plan_name: None,
            plan_quota: PlanQuota::default(),
            created_at: now,
            updated_at: now,
        };
        info!(
            tenant_id = %tenant_id,
            customer_id = %customer.id,
            pmb_number = %customer.pmb_number,
            "Customer created"
        );
        self.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    /// Look up a customer, enforcing tenant ownership. A customer id that
    /// exists under a different tenant is reported as not found, never as a
    /// cross-tenant hit.
    pub fn resolve_customer(&self, tenant_id: Uuid, customer_id: Uuid) -> BillingResult<Customer> {
        self.customers
            .get(&customer_id)
            .filter(|e| e.value().tenant_id == tenant_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| BillingError::NotFound(format!("customer {customer_id}")))
    }

    pub fn customers_for_tenant(&self, tenant_id: Uuid) -> Vec<Customer> {
        let mut customers: Vec<Customer> = self
            .customers
            .iter()
            .filter(|e| e.value().tenant_id == tenant_id)
            .map(|e| e.value().clone())
            .collect();
        customers.sort_by(|a, b| a.pmb_number.cmp(&b.pmb_number));
        customers
    }

    /// Assign (or change) a customer's plan, replacing the quota sheet.
    pub fn assign_plan(
        &self,
        tenant_id: Uuid,
        customer_id: Uuid,
        plan_name: &str,
        quota: PlanQuota,
    ) -> BillingResult<Customer> {
        let mut entry = self
            .customers
            .get_mut(&customer_id)
            .filter(|e| e.value().tenant_id == tenant_id)
            .ok_or_else(|| BillingError::NotFound(format!("customer {customer_id}")))?;
        entry.plan_name = Some(plan_name.to_string());
        entry.plan_quota = quota;
        entry.updated_at = Utc::now();
        info!(
            tenant_id = %tenant_id,
            customer_id = %customer_id,
            plan = plan_name,
            "Plan assigned"
        );
        Ok(entry.clone())
    }

    pub fn close_customer(&self, tenant_id: Uuid, customer_id: Uuid) -> BillingResult<Customer> {
        let mut entry = self
            .customers
            .get_mut(&customer_id)
            .filter(|e| e.value().tenant_id == tenant_id)
            .ok_or_else(|| BillingError::NotFound(format!("customer {customer_id}")))?;
        entry.status = CustomerStatus::Closed;
        entry.updated_at = Utc::now();
        info!(tenant_id = %tenant_id, customer_id = %customer_id, "Customer closed");
        Ok(entry.clone())
    }
}
