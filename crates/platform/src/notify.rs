//! Customer notifications for quota and billing milestones.
//!
//! The engine emits notifications through the [`Notifier`] trait; the default
//! implementation writes structured log lines. A mail/SMS gateway slots in
//! behind the same trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Quota counter crossed a warning threshold (e.g. 80% used).
    QuotaWarning,
    /// Quota counter passed the plan's included quantity.
    QuotaExceeded,
    InvoiceSent,
    PaymentReceived,
    ChargeDeclined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        tenant_id: Uuid,
        customer_id: Uuid,
        kind: NotificationKind,
        subject: &str,
        body: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            customer_id,
            kind,
            subject: subject.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Delivery seam. Implementations must be infallible from the caller's view;
/// a failed delivery is the notifier's problem, never the billing write's.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Default notifier: structured log lines only.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        info!(
            tenant_id = %notification.tenant_id,
            customer_id = %notification.customer_id,
            kind = ?notification.kind,
            subject = %notification.subject,
            "Notification emitted"
        );
    }
}
