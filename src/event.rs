//! Immutable ledger events and the append-only event log.
//!
//! Every state-changing operation appends one event per discrete money
//! movement. Events are the system of record: the log is never rewritten,
//! and append order is the authoritative tie-break when timestamps collide.

use crate::bucket::AllocationType;
use crate::money::Cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Discriminant of a ledger event.
///
/// `EmergencyUnlock` and `BillPayout` are reserved for future lock/bill
/// policies and are never emitted by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEventKind {
    Deposit,
    Allocate,
    Purchase,
    BucketSpend,
    Transfer,
    Lock,
    Release,
    EmergencyUnlock,
    BillPayout,
    Adjustment,
}

/// Spending mode of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseMode {
    /// Spend against the account's unprotected balance at large.
    General,
    /// Spend restricted to explicitly named, unlocked buckets.
    BucketOnly,
}

/// Per-kind event payload.
///
/// Audit/display data only: the engine never reads details back to make a
/// decision. Each variant carries exactly the fields its kind needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventDetail {
    Deposit {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        description: Option<String>,
    },
    Allocate {
        rule: AllocationType,
        /// Basis points applied, for PERCENT allocations.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        basis_points: Option<u32>,
    },
    Spend {
        mode: PurchaseMode,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        merchant: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        category: Option<String>,
    },
    Transfer {
        from_bucket_id: String,
        to_bucket_id: String,
    },
    Lock {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        reason: Option<String>,
    },
    Release {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        reason: Option<String>,
    },
    Adjustment {
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        changed_fields: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        note: Option<String>,
    },
}

/// An immutable record of one money movement (or audit-only adjustment).
///
/// `cents` is always non-negative; direction is implied by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Opaque unique identifier.
    pub id: String,

    /// Account the movement belongs to.
    pub account_id: String,

    /// Bucket involved, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bucket_id: Option<String>,

    /// Event discriminant.
    pub kind: LedgerEventKind,

    /// Magnitude of the movement (0 for pure audit events).
    pub cents: Cents,

    pub created_at: DateTime<Utc>,

    /// Typed per-kind payload.
    pub detail: EventDetail,

    /// Open extension slot for audit-only annotations.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub annotations: BTreeMap<String, String>,
}

/// Append-only sequence of ledger events.
///
/// Vec order is append order; indices act as the total-order sequence
/// number used to break `created_at` ties.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        EventLog { events: Vec::new() }
    }

    /// Rebuilds the log from a persisted ordered list.
    pub fn from_events(events: Vec<LedgerEvent>) -> Self {
        EventLog { events }
    }

    /// Appends one event. O(1) amortized.
    pub fn append(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    /// Number of events appended so far.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Discards events appended after `len`. Only the engine's
    /// rollback-on-failed-persist path may call this; committed events are
    /// never removed.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }

    /// All events in append order.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// The `limit` most recent events for an account, newest first.
    ///
    /// Ordered by descending `created_at`; timestamp collisions fall back
    /// to descending append order.
    pub fn recent_for_account(&self, account_id: &str, limit: usize) -> Vec<LedgerEvent> {
        let mut matching: Vec<(usize, &LedgerEvent)> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.account_id == account_id)
            .collect();
        matching.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then(seq_b.cmp(seq_a))
        });
        matching
            .into_iter()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect()
    }
}
