//! Account entity.

use crate::money::Cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cash account whose balance is partially claimed by buckets.
///
/// # Invariants
///
/// - `balance_cents >= 0` after every engine operation
/// - `balance_cents == sum of bucket balances + unallocated residue`, where
///   the residue is what replaying DEPOSIT minus ALLOCATE minus PURCHASE
///   events yields. General-mode purchases debit only the account, so the
///   residue may go negative (unlocked bucket money backing the spend);
///   the ceiling for such spending is the available-to-spend figure, never
///   locked funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque unique identifier.
    pub id: String,

    /// Current balance in cents.
    pub balance_cents: Cents,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates an empty account.
    pub fn new(id: String, now: DateTime<Utc>) -> Self {
        Account {
            id,
            balance_cents: Cents::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Credits the balance.
    pub fn credit(&mut self, amount: Cents, now: DateTime<Utc>) {
        self.balance_cents += amount;
        self.updated_at = now;
    }

    /// Debits the balance. The engine validates sufficiency first.
    pub fn debit(&mut self, amount: Cents, now: DateTime<Utc>) {
        self.balance_cents -= amount;
        self.updated_at = now;
    }
}
