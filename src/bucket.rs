//! Bucket entity and its configuration inputs.
//!
//! A bucket is a named virtual sub-account: it claims a share of incoming
//! deposits and can have part of its balance locked against spending.

use crate::money::Cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a bucket claims its share of a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationType {
    /// A fixed number of cents per deposit.
    Fixed,
    /// Basis points of whatever remains when this bucket is reached.
    Percent,
    /// The bucket takes no automatic share.
    None,
}

/// Spendability state of a bucket.
///
/// The engine only drives `Normal` and `Cooldown`. `Locked` and
/// `UnlockRequested` are reserved for a richer lock policy (bill-enforced
/// locks, two-step unlock approval) and are schema-only extension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BucketStatus {
    Normal,
    Locked,
    Cooldown,
    UnlockRequested,
}

/// Cadence of a bill rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillCadence {
    Weekly,
    Biweekly,
    Monthly,
}

/// Recurring-bill configuration attached to a bucket.
///
/// Stored and round-tripped but never executed by this engine; scheduled
/// payout is an out-of-scope extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillRule {
    pub cadence: BillCadence,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next_due_at: Option<DateTime<Utc>>,
    pub payout_amount_cents: Cents,
    pub autopay_enabled: bool,
}

/// A named sub-allocation of an account's money.
///
/// # Invariants
///
/// - `0 <= locked_cents <= balance_cents` after every engine operation
/// - `allocation_value == 0` whenever `allocation_type` is `None`
/// - `cooldown_ends_at` is `Some` only while `status` is `Cooldown`, and is
///   advisory display metadata: it never blocks an unlock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Opaque unique identifier.
    pub id: String,

    /// Owning account (back-reference, not ownership).
    pub account_id: String,

    /// Human-readable name.
    pub name: String,

    /// Allocation priority; lower runs first, ties broken by creation order.
    /// Intended to start at 1, but 0 is accepted and simply orders before
    /// everything else.
    pub priority: u32,

    /// How this bucket claims deposit money.
    pub allocation_type: AllocationType,

    /// Cents if `Fixed`, basis points if `Percent`, 0 if `None`.
    pub allocation_value: u32,

    /// Display-only savings goal, never enforced.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_cents: Option<Cents>,

    /// Current balance in cents.
    pub balance_cents: Cents,

    /// Portion of the balance protected from spending.
    pub locked_cents: Cents,

    /// Spendability state.
    pub status: BucketStatus,

    /// When the current cooldown window ends, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cooldown_ends_at: Option<DateTime<Utc>>,

    /// Whether this bucket represents a recurring bill.
    pub is_bill: bool,

    /// Bill configuration; stored, never executed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bill_rule: Option<BillRule>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bucket {
    /// Builds a bucket from its creation spec with zero balances.
    pub fn from_spec(id: String, account_id: String, spec: BucketSpec, now: DateTime<Utc>) -> Self {
        // NONE carries no meaningful value
        let allocation_value = match spec.allocation_type {
            AllocationType::None => 0,
            _ => spec.allocation_value,
        };
        Bucket {
            id,
            account_id,
            name: spec.name,
            priority: spec.priority,
            allocation_type: spec.allocation_type,
            allocation_value,
            target_cents: spec.target_cents,
            balance_cents: Cents::ZERO,
            locked_cents: Cents::ZERO,
            status: BucketStatus::Normal,
            cooldown_ends_at: None,
            is_bill: spec.is_bill,
            bill_rule: spec.bill_rule,
            created_at: now,
            updated_at: now,
        }
    }

    /// Unlocked portion of the balance.
    pub fn available_cents(&self) -> Cents {
        self.balance_cents - self.locked_cents
    }

    /// Applies the provided fields of a patch and returns the names of the
    /// fields that were set, for the adjustment audit event.
    pub fn apply_patch(&mut self, patch: BucketPatch, now: DateTime<Utc>) -> Vec<String> {
        let mut changed = Vec::new();
        if let Some(name) = patch.name {
            self.name = name;
            changed.push("name".to_string());
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
            changed.push("priority".to_string());
        }
        if let Some(allocation_type) = patch.allocation_type {
            self.allocation_type = allocation_type;
            changed.push("allocation_type".to_string());
        }
        if let Some(allocation_value) = patch.allocation_value {
            self.allocation_value = allocation_value;
            changed.push("allocation_value".to_string());
        }
        if self.allocation_type == AllocationType::None {
            self.allocation_value = 0;
        }
        if let Some(target_cents) = patch.target_cents {
            self.target_cents = target_cents;
            changed.push("target_cents".to_string());
        }
        if let Some(is_bill) = patch.is_bill {
            self.is_bill = is_bill;
            changed.push("is_bill".to_string());
        }
        if let Some(bill_rule) = patch.bill_rule {
            self.bill_rule = bill_rule;
            changed.push("bill_rule".to_string());
        }
        if !changed.is_empty() {
            self.updated_at = now;
        }
        changed
    }
}

/// Configuration for creating a bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSpec {
    pub name: String,
    pub priority: u32,
    pub allocation_type: AllocationType,
    pub allocation_value: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_cents: Option<Cents>,
    pub is_bill: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bill_rule: Option<BillRule>,
}

impl BucketSpec {
    /// A plain non-allocating bucket, the common starting point.
    pub fn named(name: impl Into<String>, priority: u32) -> Self {
        BucketSpec {
            name: name.into(),
            priority,
            allocation_type: AllocationType::None,
            allocation_value: 0,
            target_cents: None,
            is_bill: false,
            bill_rule: None,
        }
    }

    /// Sets a fixed per-deposit allocation in cents.
    pub fn fixed(mut self, cents: u32) -> Self {
        self.allocation_type = AllocationType::Fixed;
        self.allocation_value = cents;
        self
    }

    /// Sets a percentage allocation in basis points.
    pub fn percent(mut self, basis_points: u32) -> Self {
        self.allocation_type = AllocationType::Percent;
        self.allocation_value = basis_points;
        self
    }
}

/// Partial overwrite of a bucket's configuration.
///
/// Only fields that are `Some` are applied. The optional-valued fields
/// (`target_cents`, `bill_rule`) use a nested `Option` so a patch can
/// distinguish "leave as is" from "clear".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketPatch {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub priority: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub allocation_type: Option<AllocationType>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub allocation_value: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_cents: Option<Option<Cents>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_bill: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bill_rule: Option<Option<BillRule>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(spec: BucketSpec) -> Bucket {
        Bucket::from_spec("b1".to_string(), "a1".to_string(), spec, Utc::now())
    }

    #[test]
    fn test_from_spec_starts_empty_and_normal() {
        let b = bucket(BucketSpec::named("Rent", 1).fixed(50_000));
        assert_eq!(b.balance_cents, Cents::ZERO);
        assert_eq!(b.locked_cents, Cents::ZERO);
        assert_eq!(b.status, BucketStatus::Normal);
        assert_eq!(b.cooldown_ends_at, None);
        assert_eq!(b.allocation_type, AllocationType::Fixed);
        assert_eq!(b.allocation_value, 50_000);
    }

    #[test]
    fn test_from_spec_resets_value_for_none_allocation() {
        let mut spec = BucketSpec::named("Misc", 5);
        spec.allocation_value = 123;
        let b = bucket(spec);
        assert_eq!(b.allocation_type, AllocationType::None);
        assert_eq!(b.allocation_value, 0);
    }

    #[test]
    fn test_available_cents() {
        let mut b = bucket(BucketSpec::named("Fun", 3));
        b.balance_cents = Cents::new(10_000);
        b.locked_cents = Cents::new(4_000);
        assert_eq!(b.available_cents(), Cents::new(6_000));
    }

    #[test]
    fn test_apply_patch_reports_changed_fields() {
        let mut b = bucket(BucketSpec::named("Fun", 3).percent(500));
        let changed = b.apply_patch(
            BucketPatch {
                name: Some("Leisure".to_string()),
                priority: Some(2),
                target_cents: Some(Some(Cents::new(20_000))),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(changed, vec!["name", "priority", "target_cents"]);
        assert_eq!(b.name, "Leisure");
        assert_eq!(b.priority, 2);
        assert_eq!(b.target_cents, Some(Cents::new(20_000)));
        // untouched fields survive
        assert_eq!(b.allocation_type, AllocationType::Percent);
        assert_eq!(b.allocation_value, 500);
    }

    #[test]
    fn test_apply_patch_switch_to_none_clears_value() {
        let mut b = bucket(BucketSpec::named("Fun", 3).percent(500));
        let changed = b.apply_patch(
            BucketPatch {
                allocation_type: Some(AllocationType::None),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(changed, vec!["allocation_type"]);
        assert_eq!(b.allocation_value, 0);
    }

    #[test]
    fn test_apply_patch_can_clear_optionals() {
        let mut b = bucket(BucketSpec::named("Fun", 3));
        b.target_cents = Some(Cents::new(1_000));
        b.apply_patch(
            BucketPatch {
                target_cents: Some(None),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(b.target_cents, None);
    }

    #[test]
    fn test_empty_patch_changes_nothing() {
        let mut b = bucket(BucketSpec::named("Fun", 3));
        let before = b.clone();
        let changed = b.apply_patch(BucketPatch::default(), Utc::now());
        assert!(changed.is_empty());
        assert_eq!(b, before);
    }
}
