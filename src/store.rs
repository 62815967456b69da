//! Entity store and the persistence capability.
//!
//! The store is a pure keyed-map abstraction over the current-state
//! snapshots of accounts and buckets; no validation logic lives here. The
//! `Persistence` trait is the serialization boundary to whatever durable
//! medium the host provides; the engine treats a successful `save` as its
//! commit point.

use crate::account::Account;
use crate::bucket::Bucket;
use crate::event::LedgerEvent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// In-memory keyed maps of accounts and buckets.
///
/// Bucket listing is priority-ascending with creation-order tie-break; the
/// store keeps an insertion sequence per bucket to make the tie-break
/// stable across snapshot round-trips.
#[derive(Debug, Default, Clone)]
pub struct EntityStore {
    accounts: HashMap<String, Account>,
    buckets: HashMap<String, Bucket>,
    /// Bucket ids in insertion order.
    bucket_order: Vec<String>,
}

impl EntityStore {
    pub fn new() -> Self {
        EntityStore::default()
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn put_account(&mut self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    pub fn bucket(&self, id: &str) -> Option<&Bucket> {
        self.buckets.get(id)
    }

    pub fn put_bucket(&mut self, bucket: Bucket) {
        if !self.buckets.contains_key(&bucket.id) {
            self.bucket_order.push(bucket.id.clone());
        }
        self.buckets.insert(bucket.id.clone(), bucket);
    }

    pub fn remove_bucket(&mut self, id: &str) -> Option<Bucket> {
        self.bucket_order.retain(|b| b != id);
        self.buckets.remove(id)
    }

    /// Buckets of an account, priority ascending, creation order on ties.
    pub fn buckets_for_account(&self, account_id: &str) -> Vec<&Bucket> {
        let mut buckets: Vec<&Bucket> = self
            .bucket_order
            .iter()
            .filter_map(|id| self.buckets.get(id))
            .filter(|b| b.account_id == account_id)
            .collect();
        // stable sort preserves insertion order within equal priorities
        buckets.sort_by_key(|b| b.priority);
        buckets
    }

    /// All buckets in insertion order (snapshot serialization).
    pub fn all_buckets(&self) -> Vec<&Bucket> {
        self.bucket_order
            .iter()
            .filter_map(|id| self.buckets.get(id))
            .collect()
    }

    /// All accounts, id-sorted for deterministic snapshots.
    pub fn all_accounts(&self) -> Vec<&Account> {
        let mut accounts: Vec<&Account> = self.accounts.values().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }
}

/// Serialized form of the whole ledger: three named collections.
///
/// Buckets are stored in insertion order and events in append order, so a
/// round-trip preserves both tie-break orderings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub accounts: Vec<Account>,
    pub buckets: Vec<Bucket>,
    pub events: Vec<LedgerEvent>,
}

impl LedgerSnapshot {
    /// Captures the current store and log contents.
    pub fn capture(store: &EntityStore, events: &[LedgerEvent]) -> Self {
        LedgerSnapshot {
            accounts: store.all_accounts().into_iter().cloned().collect(),
            buckets: store.all_buckets().into_iter().cloned().collect(),
            events: events.to_vec(),
        }
    }

    /// Rebuilds an entity store from this snapshot.
    pub fn restore_store(&self) -> EntityStore {
        let mut store = EntityStore::new();
        for account in &self.accounts {
            store.put_account(account.clone());
        }
        for bucket in &self.buckets {
            store.put_bucket(bucket.clone());
        }
        store
    }
}

/// Error from the persistence collaborator.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PersistenceError(pub String);

/// Injected durable-storage capability.
///
/// `save` must exhibit write-then-return-success semantics: once it returns
/// `Ok`, the snapshot is the durable state. The engine rolls its in-memory
/// mutation back when `save` fails, so memory and storage never diverge.
pub trait Persistence {
    fn save(&mut self, snapshot: &LedgerSnapshot) -> Result<(), PersistenceError>;
    fn load(&mut self) -> Result<Option<LedgerSnapshot>, PersistenceError>;
}

/// No-op persistence for tests and ephemeral sessions.
///
/// Keeps the last saved snapshot in memory so `load` still round-trips.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    saved: Option<LedgerSnapshot>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        MemoryPersistence::default()
    }
}

impl Persistence for MemoryPersistence {
    fn save(&mut self, snapshot: &LedgerSnapshot) -> Result<(), PersistenceError> {
        self.saved = Some(snapshot.clone());
        Ok(())
    }

    fn load(&mut self) -> Result<Option<LedgerSnapshot>, PersistenceError> {
        Ok(self.saved.clone())
    }
}

/// JSON-file persistence.
///
/// Serializes the full snapshot to a single JSON document. Timestamps
/// serialize as RFC 3339 and absent optionals are omitted entirely.
#[derive(Debug)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFilePersistence { path: path.into() }
    }
}

impl Persistence for JsonFilePersistence {
    fn save(&mut self, snapshot: &LedgerSnapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| PersistenceError(format!("serialize snapshot: {e}")))?;
        fs::write(&self.path, json)
            .map_err(|e| PersistenceError(format!("write {}: {e}", self.path.display())))
    }

    fn load(&mut self) -> Result<Option<LedgerSnapshot>, PersistenceError> {
        match fs::read_to_string(&self.path) {
            Ok(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| PersistenceError(format!("parse {}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError(format!(
                "read {}: {e}",
                self.path.display()
            ))),
        }
    }
}
