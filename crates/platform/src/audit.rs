//! Tamper-evident audit trail for billing actions.
//!
//! Every charge, void, and payment is appended to a hash-chained log: each
//! entry carries a SHA-256 over its own content plus the previous entry's
//! hash, so any after-the-fact edit breaks the chain and is detectable.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub sequence: u64,
    pub tenant_id: Uuid,
    /// Staff member who performed the action, when known.
    pub actor_id: Option<Uuid>,
    /// Dotted action name, e.g. `charge.void` or `invoice.payment`.
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    /// SHA-256 of this entry's content.
    pub event_hash: String,
    /// Hash of the previous entry (`genesis` for the first).
    pub previous_hash: String,
}

/// Result of walking the chain front to back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainVerification {
    pub total_events: usize,
    pub valid_events: usize,
    pub tampered_sequences: Vec<u64>,
    pub chain_intact: bool,
}

/// Append-only, hash-chained audit log.
pub struct AuditLogger {
    events: DashMap<Uuid, AuditEvent>,
    sequence: parking_lot::Mutex<u64>,
    last_hash: parking_lot::Mutex<String>,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
            sequence: parking_lot::Mutex::new(0),
            last_hash: parking_lot::Mutex::new("genesis".to_string()),
        }
    }

    /// Append an action to the trail.
    pub fn record(
        &self,
        tenant_id: Uuid,
        actor_id: Option<Uuid>,
        action: &str,
        resource_type: &str,
        resource_id: &str,
        details: serde_json::Value,
    ) -> AuditEvent {
        let event = AuditEvent {
            id: Uuid::new_v4(),
            sequence: 0,
            tenant_id,
            actor_id,
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            details,
            timestamp: Utc::now(),
            event_hash: String::new(),
            previous_hash: String::new(),
        };
        let (seq, chained) = self.chain_event(event);
        info!(
            event_id = %chained.id,
            sequence = seq,
            action = %chained.action,
            resource = %chained.resource_type,
            "Audit event recorded"
        );
        self.events.insert(chained.id, chained.clone());
        chained
    }

    /// Like [`record`](Self::record), but serialization failures in the
    /// detail payload are logged and swallowed. Billing writes must never
    /// fail because the audit detail didn't serialize.
    pub fn record_best_effort<T: Serialize>(
        &self,
        tenant_id: Uuid,
        actor_id: Option<Uuid>,
        action: &str,
        resource_type: &str,
        resource_id: &str,
        details: &T,
    ) {
        let details = match serde_json::to_value(details) {
            Ok(value) => value,
            Err(err) => {
                warn!(action, error = %err, "Audit detail not serializable, recording without it");
                serde_json::Value::Null
            }
        };
        self.record(tenant_id, actor_id, action, resource_type, resource_id, details);
    }

    /// Assign the next sequence number, link to the previous hash, and hash
    /// the entry. Sequence and last-hash are updated under one pair of locks
    /// so concurrent writers cannot interleave a fork into the chain.
    fn chain_event(&self, mut event: AuditEvent) -> (u64, AuditEvent) {
        let mut seq = self.sequence.lock();
        *seq += 1;
        event.sequence = *seq;

        let mut prev_hash = self.last_hash.lock();
        event.previous_hash = prev_hash.clone();
        let hash = sha256_hex(&chain_content(&event));
        event.event_hash = hash.clone();
        *prev_hash = hash;

        (*seq, event)
    }

    /// Walk the full chain, re-hashing each entry.
    pub fn verify_chain(&self) -> ChainVerification {
        let mut events: Vec<AuditEvent> = self.events.iter().map(|e| e.value().clone()).collect();
        events.sort_by_key(|e| e.sequence);

        let total = events.len();
        let mut valid = 0;
        let mut tampered = Vec::new();
        let mut expected_prev = "genesis".to_string();

        for event in &events {
            if event.previous_hash != expected_prev
                || sha256_hex(&chain_content(event)) != event.event_hash
            {
                tampered.push(event.sequence);
            } else {
                valid += 1;
            }
            expected_prev = event.event_hash.clone();
        }

        ChainVerification {
            total_events: total,
            valid_events: valid,
            tampered_sequences: tampered,
            chain_intact: valid == total,
        }
    }

    /// Tenant-scoped query, newest first.
    pub fn query(
        &self,
        tenant_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        action: Option<&str>,
        limit: usize,
    ) -> Vec<AuditEvent> {
        let mut results: Vec<AuditEvent> = self
            .events
            .iter()
            .filter(|e| {
                let ev = e.value();
                ev.tenant_id == tenant_id
                    && from.map(|f| ev.timestamp >= f).unwrap_or(true)
                    && to.map(|t| ev.timestamp <= t).unwrap_or(true)
                    && action.map(|a| ev.action == a).unwrap_or(true)
            })
            .map(|e| e.value().clone())
            .collect();
        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        results.truncate(limit);
        results
    }
}

fn chain_content(event: &AuditEvent) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}",
        event.sequence,
        event.action,
        event.resource_type,
        event.resource_id,
        event.timestamp.to_rfc3339(),
        event.previous_hash,
    )
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
