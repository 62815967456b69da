//! Core ledger engine.
//!
//! Applies deposits, purchases, lock/unlock requests, and bucket
//! administration as atomic transitions over the entity store, appending
//! one immutable event per money movement. Every operation validates
//! completely before mutating anything (check-then-act), and a successful
//! persistence write is the commit point: if the write fails, the
//! in-memory mutation is rolled back.

use crate::account::Account;
use crate::bucket::{AllocationType, Bucket, BucketPatch, BucketSpec, BucketStatus};
use crate::clock::{Clock, SystemClock};
use crate::error::{LedgerError, Result};
use crate::event::{EventDetail, EventLog, LedgerEvent, LedgerEventKind, PurchaseMode};
use crate::ids::{IdSource, UuidSource};
use crate::money::Cents;
use crate::store::{EntityStore, LedgerSnapshot, MemoryPersistence, Persistence};
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Hours a bucket stays in cooldown after a lock. Fixed, non-configurable.
const COOLDOWN_HOURS: i64 = 24;

/// Number of events returned by the summary projector.
pub const RECENT_EVENT_LIMIT: usize = 10;

/// A purchase to settle.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub account_id: String,
    pub cents: i64,
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub mode: PurchaseMode,
    /// Buckets to drain, in order; required iff `mode` is `BucketOnly`.
    pub bucket_ids: Vec<String>,
}

impl PurchaseRequest {
    /// A general-mode purchase against the account's unprotected balance.
    pub fn general(account_id: impl Into<String>, cents: i64) -> Self {
        PurchaseRequest {
            account_id: account_id.into(),
            cents,
            merchant: None,
            category: None,
            mode: PurchaseMode::General,
            bucket_ids: Vec::new(),
        }
    }

    /// A purchase restricted to the named buckets, drained in order.
    pub fn bucket_only(
        account_id: impl Into<String>,
        cents: i64,
        bucket_ids: Vec<String>,
    ) -> Self {
        PurchaseRequest {
            account_id: account_id.into(),
            cents,
            merchant: None,
            category: None,
            mode: PurchaseMode::BucketOnly,
            bucket_ids,
        }
    }

    pub fn merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Outcome of a deposit: the credited amount plus the full ordered list of
/// events produced, for allocation-preview display by the caller.
#[derive(Debug, Clone)]
pub struct DepositReceipt {
    pub account_id: String,
    pub credited: Cents,
    pub events: Vec<LedgerEvent>,
}

/// Read-only projection of an account for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub account: Account,
    /// All buckets of the account, priority order.
    pub buckets: Vec<Bucket>,
    pub total_locked_cents: Cents,
    /// Account balance minus every bucket's locked amount; the ceiling for
    /// general-mode purchases.
    pub available_to_spend_cents: Cents,
    /// The 10 most recent events, newest first.
    pub recent_events: Vec<LedgerEvent>,
}

/// The safe-to-spend ledger engine.
///
/// Single-writer: all mutating operations take `&mut self` and apply as
/// indivisible transitions. On a multi-threaded runtime, wrap the engine in
/// a mutex (or give it to one actor); summaries read only committed state.
pub struct LedgerEngine {
    store: EntityStore,
    log: EventLog,
    persistence: Box<dyn Persistence>,
    clock: Box<dyn Clock>,
    ids: Box<dyn IdSource>,
}

impl LedgerEngine {
    /// An engine over in-memory persistence, wall-clock time, and UUID ids.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryPersistence::new()))
    }

    /// An empty engine over the given persistence capability.
    pub fn new(persistence: Box<dyn Persistence>) -> Self {
        Self::with_parts(persistence, Box::new(SystemClock), Box::new(UuidSource))
    }

    /// Full capability injection.
    pub fn with_parts(
        persistence: Box<dyn Persistence>,
        clock: Box<dyn Clock>,
        ids: Box<dyn IdSource>,
    ) -> Self {
        LedgerEngine {
            store: EntityStore::new(),
            log: EventLog::new(),
            persistence,
            clock,
            ids,
        }
    }

    /// Rebuilds an engine from the snapshot held by `persistence`, or an
    /// empty engine if nothing was ever saved.
    pub fn load(mut persistence: Box<dyn Persistence>) -> Result<Self> {
        let snapshot = persistence
            .load()
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let mut engine = Self::new(persistence);
        if let Some(snapshot) = snapshot {
            engine.store = snapshot.restore_store();
            engine.log = EventLog::from_events(snapshot.events);
        }
        Ok(engine)
    }

    // ---- account & bucket administration ----

    /// Creates an empty account.
    pub fn create_account(&mut self) -> Result<Account> {
        let now = self.clock.now();
        let account = Account::new(self.ids.next_id(), now);
        let checkpoint = self.store.clone();
        let log_len = self.log.len();

        self.store.put_account(account.clone());
        self.commit(checkpoint, log_len)?;

        debug!("created account {}", account.id);
        Ok(account)
    }

    /// Creates a bucket under an existing account.
    pub fn create_bucket(&mut self, account_id: &str, spec: BucketSpec) -> Result<Bucket> {
        self.require_account(account_id)?;
        let now = self.clock.now();
        let bucket = Bucket::from_spec(
            self.ids.next_id(),
            account_id.to_string(),
            spec,
            now,
        );
        let checkpoint = self.store.clone();
        let log_len = self.log.len();

        self.store.put_bucket(bucket.clone());
        self.commit(checkpoint, log_len)?;

        debug!(
            "created bucket {} ({:?} priority {}) under account {}",
            bucket.id, bucket.allocation_type, bucket.priority, account_id
        );
        Ok(bucket)
    }

    /// Overwrites the provided fields of a bucket's configuration.
    ///
    /// Always appends an ADJUSTMENT event recording which fields changed.
    pub fn update_bucket(&mut self, bucket_id: &str, patch: BucketPatch) -> Result<Bucket> {
        let mut bucket = self.require_bucket(bucket_id)?.clone();
        let now = self.clock.now();
        let checkpoint = self.store.clone();
        let log_len = self.log.len();

        let changed = bucket.apply_patch(patch, now);
        let account_id = bucket.account_id.clone();
        let event = self.make_event(
            &account_id,
            Some(bucket_id),
            LedgerEventKind::Adjustment,
            Cents::ZERO,
            now,
            EventDetail::Adjustment {
                changed_fields: changed.clone(),
                note: None,
            },
        );

        self.store.put_bucket(bucket.clone());
        self.log.append(event);
        self.commit(checkpoint, log_len)?;

        debug!("updated bucket {bucket_id}: {changed:?}");
        Ok(bucket)
    }

    /// Removes an empty bucket.
    pub fn delete_bucket(&mut self, bucket_id: &str) -> Result<()> {
        let bucket = self.require_bucket(bucket_id)?;
        if bucket.balance_cents.is_positive() {
            return Err(LedgerError::BucketHasBalance {
                bucket_id: bucket_id.to_string(),
                balance: bucket.balance_cents,
            });
        }
        let account_id = bucket.account_id.clone();
        let name = bucket.name.clone();
        let now = self.clock.now();
        let checkpoint = self.store.clone();
        let log_len = self.log.len();

        self.store.remove_bucket(bucket_id);
        let event = self.make_event(
            &account_id,
            Some(bucket_id),
            LedgerEventKind::Adjustment,
            Cents::ZERO,
            now,
            EventDetail::Adjustment {
                changed_fields: Vec::new(),
                note: Some(format!("deleted bucket '{name}'")),
            },
        );
        self.log.append(event);
        self.commit(checkpoint, log_len)?;

        debug!("deleted bucket {bucket_id} ('{name}')");
        Ok(())
    }

    // ---- money movement ----

    /// Credits the account and allocates shares to its buckets.
    ///
    /// Allocation runs in two passes over the priority-ordered bucket list:
    /// FIXED buckets claim `min(allocation_value, remaining)` first, then
    /// PERCENT buckets claim basis points of whatever remains when each is
    /// reached. Percentages are sequential claims on the shrinking
    /// remainder, not simultaneous claims on the original deposit. Leftover
    /// money stays in the account as unallocated, spendable under general
    /// mode.
    pub fn deposit(
        &mut self,
        account_id: &str,
        cents: i64,
        description: Option<&str>,
    ) -> Result<DepositReceipt> {
        let amount = positive(cents)?;
        let mut account = self.require_account(account_id)?.clone();
        let mut buckets: Vec<Bucket> = self
            .store
            .buckets_for_account(account_id)
            .into_iter()
            .cloned()
            .collect();
        let now = self.clock.now();
        let checkpoint = self.store.clone();
        let log_len = self.log.len();

        account.credit(amount, now);
        let mut events = vec![self.make_event(
            account_id,
            None,
            LedgerEventKind::Deposit,
            amount,
            now,
            EventDetail::Deposit {
                description: description.map(String::from),
            },
        )];

        let mut remaining = amount;

        // Pass 1: fixed amounts, priority order.
        for bucket in buckets.iter_mut() {
            if remaining.is_zero() {
                break;
            }
            if bucket.allocation_type != AllocationType::Fixed {
                continue;
            }
            let slice = Cents::new(i64::from(bucket.allocation_value)).min(remaining);
            if slice.is_positive() {
                bucket.balance_cents += slice;
                bucket.updated_at = now;
                remaining -= slice;
                let event = self.make_event(
                    account_id,
                    Some(bucket.id.as_str()),
                    LedgerEventKind::Allocate,
                    slice,
                    now,
                    EventDetail::Allocate {
                        rule: AllocationType::Fixed,
                        basis_points: None,
                    },
                );
                events.push(event);
            }
        }

        // Pass 2: percentages of the remainder, same priority order.
        for bucket in buckets.iter_mut() {
            if remaining.is_zero() {
                break;
            }
            if bucket.allocation_type != AllocationType::Percent {
                continue;
            }
            let slice = remaining.share(bucket.allocation_value);
            if slice.is_positive() {
                bucket.balance_cents += slice;
                bucket.updated_at = now;
                remaining -= slice;
                let event = self.make_event(
                    account_id,
                    Some(bucket.id.as_str()),
                    LedgerEventKind::Allocate,
                    slice,
                    now,
                    EventDetail::Allocate {
                        rule: AllocationType::Percent,
                        basis_points: Some(bucket.allocation_value),
                    },
                );
                events.push(event);
            }
        }

        self.store.put_account(account);
        for bucket in buckets {
            self.store.put_bucket(bucket);
        }
        for event in &events {
            self.log.append(event.clone());
        }
        self.commit(checkpoint, log_len)?;
        self.assert_invariants(account_id);

        debug!(
            "deposited {amount} to account {account_id}: {} allocations, {remaining} unallocated",
            events.len() - 1
        );
        Ok(DepositReceipt {
            account_id: account_id.to_string(),
            credited: amount,
            events,
        })
    }

    /// Settles a purchase in one of the two spending modes.
    ///
    /// General mode spends the account's unprotected balance at large and
    /// touches no bucket; bucket-only mode drains the named unlocked
    /// buckets in the order given. Locked funds are never implicitly spent.
    pub fn purchase(&mut self, request: PurchaseRequest) -> Result<Vec<LedgerEvent>> {
        let amount = positive(request.cents)?;
        let account_id = request.account_id.clone();
        let mut account = self.require_account(&account_id)?.clone();
        if account.balance_cents < amount {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                balance: account.balance_cents,
            });
        }

        let detail = EventDetail::Spend {
            mode: request.mode,
            merchant: request.merchant.clone(),
            category: request.category.clone(),
        };
        let now = self.clock.now();

        match request.mode {
            PurchaseMode::General => {
                let total_locked: Cents = self
                    .store
                    .buckets_for_account(&account_id)
                    .iter()
                    .map(|b| b.locked_cents)
                    .sum();
                let available = account.balance_cents - total_locked;
                if available < amount {
                    warn!(
                        "general purchase of {amount} on account {account_id} refused: only {available} available"
                    );
                    return Err(LedgerError::InsufficientAvailableFunds {
                        requested: amount,
                        available,
                    });
                }

                let checkpoint = self.store.clone();
                let log_len = self.log.len();

                account.debit(amount, now);
                let event = self.make_event(
                    &account_id,
                    None,
                    LedgerEventKind::Purchase,
                    amount,
                    now,
                    detail,
                );

                self.store.put_account(account);
                self.log.append(event.clone());
                self.commit(checkpoint, log_len)?;
                self.assert_invariants(&account_id);

                debug!("general purchase of {amount} on account {account_id}");
                Ok(vec![event])
            }
            PurchaseMode::BucketOnly => {
                if request.bucket_ids.is_empty() {
                    return Err(LedgerError::NoBucketsSpecified);
                }

                // Unknown ids and buckets of other accounts are dropped
                // silently and duplicates collapse to their first occurrence;
                // status gates participation, so a cooldown bucket
                // contributes zero even if part of its balance is nominally
                // unlocked.
                let mut seen = HashSet::new();
                let mut spendable: Vec<Bucket> = request
                    .bucket_ids
                    .iter()
                    .filter(|id| seen.insert(id.as_str()))
                    .filter_map(|id| self.store.bucket(id))
                    .filter(|b| b.account_id == account_id)
                    .filter(|b| b.status == BucketStatus::Normal)
                    .cloned()
                    .collect();

                let available: Cents = spendable.iter().map(|b| b.available_cents()).sum();
                if available < amount {
                    warn!(
                        "bucket-only purchase of {amount} on account {account_id} refused: only {available} in named buckets"
                    );
                    return Err(LedgerError::InsufficientBucketFunds {
                        requested: amount,
                        available,
                    });
                }

                let checkpoint = self.store.clone();
                let log_len = self.log.len();

                account.debit(amount, now);
                let mut events = Vec::new();
                let mut remaining = amount;
                for bucket in spendable.iter_mut() {
                    if remaining.is_zero() {
                        break;
                    }
                    let slice = bucket.available_cents().min(remaining);
                    if slice.is_positive() {
                        bucket.balance_cents -= slice;
                        bucket.updated_at = now;
                        remaining -= slice;
                        let event = self.make_event(
                            &account_id,
                            Some(bucket.id.as_str()),
                            LedgerEventKind::BucketSpend,
                            slice,
                            now,
                            detail.clone(),
                        );
                        events.push(event);
                    }
                }

                self.store.put_account(account);
                for bucket in spendable {
                    self.store.put_bucket(bucket);
                }
                for event in &events {
                    self.log.append(event.clone());
                }
                self.commit(checkpoint, log_len)?;
                self.assert_invariants(&account_id);

                debug!(
                    "bucket-only purchase of {amount} on account {account_id} across {} buckets",
                    events.len()
                );
                Ok(events)
            }
        }
    }

    /// Moves unlocked funds between two buckets of the same account.
    ///
    /// The account balance is unchanged; one TRANSFER event records the
    /// movement.
    pub fn transfer(&mut self, from_bucket_id: &str, to_bucket_id: &str, cents: i64) -> Result<()> {
        let amount = positive(cents)?;
        let from = self.require_bucket(from_bucket_id)?.clone();
        let to = self.require_bucket(to_bucket_id)?.clone();
        if from.account_id != to.account_id {
            return Err(LedgerError::CrossAccountTransfer {
                from_bucket_id: from_bucket_id.to_string(),
                to_bucket_id: to_bucket_id.to_string(),
            });
        }
        if amount > from.available_cents() {
            return Err(LedgerError::InsufficientUnlockedFunds {
                requested: amount,
                available: from.available_cents(),
            });
        }

        let account_id = from.account_id.clone();
        let now = self.clock.now();
        let checkpoint = self.store.clone();
        let log_len = self.log.len();

        // Sequential store writes keep a self-transfer a net no-op.
        let mut from = from;
        from.balance_cents -= amount;
        from.updated_at = now;
        self.store.put_bucket(from);
        let mut to = self.store.bucket(to_bucket_id).cloned().unwrap_or(to);
        to.balance_cents += amount;
        to.updated_at = now;
        self.store.put_bucket(to);

        let event = self.make_event(
            &account_id,
            None,
            LedgerEventKind::Transfer,
            amount,
            now,
            EventDetail::Transfer {
                from_bucket_id: from_bucket_id.to_string(),
                to_bucket_id: to_bucket_id.to_string(),
            },
        );
        self.log.append(event);
        self.commit(checkpoint, log_len)?;
        self.assert_invariants(&account_id);

        debug!("transferred {amount} from bucket {from_bucket_id} to {to_bucket_id}");
        Ok(())
    }

    // ---- lock / cooldown state machine ----

    /// Protects part of a bucket's balance from spending.
    ///
    /// Moves the bucket to COOLDOWN for a fixed 24-hour window. Re-locking
    /// while already in cooldown accumulates into `locked_cents` and
    /// overwrites the cooldown end time rather than stacking independent
    /// locks.
    pub fn lock(&mut self, bucket_id: &str, cents: i64) -> Result<()> {
        let amount = positive(cents)?;
        let mut bucket = self.require_bucket(bucket_id)?.clone();
        if amount > bucket.available_cents() {
            return Err(LedgerError::LockExceedsAvailable {
                requested: amount,
                available: bucket.available_cents(),
            });
        }

        let account_id = bucket.account_id.clone();
        let now = self.clock.now();
        let checkpoint = self.store.clone();
        let log_len = self.log.len();

        bucket.locked_cents += amount;
        bucket.status = BucketStatus::Cooldown;
        bucket.cooldown_ends_at = Some(now + Duration::hours(COOLDOWN_HOURS));
        bucket.updated_at = now;

        self.store.put_bucket(bucket);
        let event = self.make_event(
            &account_id,
            Some(bucket_id),
            LedgerEventKind::Lock,
            amount,
            now,
            EventDetail::Lock { reason: None },
        );
        self.log.append(event);
        self.commit(checkpoint, log_len)?;
        self.assert_invariants(&account_id);

        debug!("locked {amount} in bucket {bucket_id} until cooldown expiry");
        Ok(())
    }

    /// Releases locked funds; defaults to the full locked amount.
    ///
    /// The cooldown window is advisory display metadata: an unlock is never
    /// blocked by `cooldown_ends_at` not having elapsed. When `locked_cents`
    /// reaches zero the bucket returns to NORMAL and the window is cleared;
    /// a partial unlock leaves it in COOLDOWN.
    pub fn unlock(&mut self, bucket_id: &str, cents: Option<i64>) -> Result<()> {
        let mut bucket = self.require_bucket(bucket_id)?.clone();
        let amount = match cents {
            Some(cents) => positive(cents)?,
            None => bucket.locked_cents,
        };
        if amount > bucket.locked_cents {
            return Err(LedgerError::UnlockExceedsLocked {
                requested: amount,
                locked: bucket.locked_cents,
            });
        }

        let account_id = bucket.account_id.clone();
        let now = self.clock.now();
        let checkpoint = self.store.clone();
        let log_len = self.log.len();

        bucket.locked_cents -= amount;
        if bucket.locked_cents.is_zero() {
            bucket.status = BucketStatus::Normal;
            bucket.cooldown_ends_at = None;
        }
        bucket.updated_at = now;

        self.store.put_bucket(bucket);
        let event = self.make_event(
            &account_id,
            Some(bucket_id),
            LedgerEventKind::Release,
            amount,
            now,
            EventDetail::Release { reason: None },
        );
        self.log.append(event);
        self.commit(checkpoint, log_len)?;
        self.assert_invariants(&account_id);

        debug!("released {amount} from bucket {bucket_id}");
        Ok(())
    }

    // ---- projections & reads ----

    /// Derives the read-only account view from committed state plus the
    /// tail of the event log.
    pub fn summarize(&self, account_id: &str) -> Result<AccountSummary> {
        let account = self.require_account(account_id)?.clone();
        let buckets: Vec<Bucket> = self
            .store
            .buckets_for_account(account_id)
            .into_iter()
            .cloned()
            .collect();
        let total_locked_cents: Cents = buckets.iter().map(|b| b.locked_cents).sum();
        let available_to_spend_cents = account.balance_cents - total_locked_cents;
        let recent_events = self.log.recent_for_account(account_id, RECENT_EVENT_LIMIT);

        Ok(AccountSummary {
            account,
            buckets,
            total_locked_cents,
            available_to_spend_cents,
            recent_events,
        })
    }

    /// Current account snapshot, if it exists.
    pub fn account(&self, account_id: &str) -> Option<&Account> {
        self.store.account(account_id)
    }

    /// Current bucket snapshot, if it exists.
    pub fn bucket(&self, bucket_id: &str) -> Option<&Bucket> {
        self.store.bucket(bucket_id)
    }

    /// The full event log in append order.
    pub fn events(&self) -> &[LedgerEvent] {
        self.log.events()
    }

    /// Unallocated residue of an account derived purely from the log:
    /// DEPOSIT credits minus ALLOCATE and PURCHASE debits. General spending
    /// draws only on the account pool, so this equals
    /// `balance - sum of bucket balances` at all times (and may be
    /// negative when general purchases overdraw the pool against unlocked
    /// bucket money).
    pub fn replay_residue(&self, account_id: &str) -> Cents {
        self.log
            .events()
            .iter()
            .filter(|e| e.account_id == account_id)
            .fold(Cents::ZERO, |residue, e| match e.kind {
                LedgerEventKind::Deposit => residue + e.cents,
                LedgerEventKind::Allocate | LedgerEventKind::Purchase => residue - e.cents,
                _ => residue,
            })
    }

    // ---- internals ----

    fn require_account(&self, account_id: &str) -> Result<&Account> {
        self.store
            .account(account_id)
            .ok_or_else(|| LedgerError::AccountNotFound {
                account_id: account_id.to_string(),
            })
    }

    fn require_bucket(&self, bucket_id: &str) -> Result<&Bucket> {
        self.store
            .bucket(bucket_id)
            .ok_or_else(|| LedgerError::BucketNotFound {
                bucket_id: bucket_id.to_string(),
            })
    }

    fn make_event(
        &mut self,
        account_id: &str,
        bucket_id: Option<&str>,
        kind: LedgerEventKind,
        cents: Cents,
        now: DateTime<Utc>,
        detail: EventDetail,
    ) -> LedgerEvent {
        LedgerEvent {
            id: self.ids.next_id(),
            account_id: account_id.to_string(),
            bucket_id: bucket_id.map(String::from),
            kind,
            cents,
            created_at: now,
            detail,
            annotations: BTreeMap::new(),
        }
    }

    /// Persists the mutated state; on failure restores the checkpoint and
    /// truncates the log so memory never diverges from storage.
    fn commit(&mut self, checkpoint: EntityStore, log_len: usize) -> Result<()> {
        let snapshot = LedgerSnapshot::capture(&self.store, self.log.events());
        match self.persistence.save(&snapshot) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("persistence write failed, rolling back: {e}");
                self.store = checkpoint;
                self.log.truncate(log_len);
                Err(LedgerError::Storage(e.to_string()))
            }
        }
    }

    /// Debug-build verification of the conservation and non-negativity
    /// properties after a mutation. Compiles to nothing in release.
    fn assert_invariants(&self, account_id: &str) {
        if let Some(account) = self.store.account(account_id) {
            let buckets = self.store.buckets_for_account(account_id);
            let mut bucket_total = Cents::ZERO;
            for bucket in &buckets {
                debug_assert!(bucket.balance_cents >= Cents::ZERO);
                debug_assert!(bucket.locked_cents >= Cents::ZERO);
                debug_assert!(bucket.locked_cents <= bucket.balance_cents);
                bucket_total += bucket.balance_cents;
            }
            debug_assert_eq!(
                account.balance_cents - bucket_total,
                self.replay_residue(account_id),
            );
        }
    }
}

fn positive(cents: i64) -> Result<Cents> {
    if cents <= 0 {
        return Err(LedgerError::InvalidAmount { cents });
    }
    Ok(Cents::new(cents))
}
