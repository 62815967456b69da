//! # Safe to Spend
//!
//! A ledger and allocation engine for a personal cash account subdivided
//! into named virtual sub-accounts ("buckets") that receive automatic
//! shares of incoming money and can be temporarily locked against spending.
//!
//! ## Design Principles
//!
//! - **Integer money**: all amounts are whole cents; percentages are basis
//!   points, so no floating-point arithmetic touches a balance
//! - **Append-only audit trail**: every money movement appends exactly one
//!   immutable event; the log is the system of record
//! - **Check-then-act**: every operation validates completely before
//!   mutating, and a failed persistence write rolls the mutation back
//! - **Strict invariants**: money is never created, destroyed, or
//!   double-counted; `locked_cents <= balance_cents` always holds
//!
//! ## Example
//!
//! ```
//! use safe_to_spend::{BucketSpec, LedgerEngine, PurchaseRequest};
//!
//! let mut engine = LedgerEngine::in_memory();
//! let account = engine.create_account().unwrap();
//! engine
//!     .create_bucket(&account.id, BucketSpec::named("Rent", 1).fixed(50_000))
//!     .unwrap();
//! engine.deposit(&account.id, 100_000, Some("payday")).unwrap();
//! engine
//!     .purchase(PurchaseRequest::general(&account.id, 2_000).merchant("grocer"))
//!     .unwrap();
//! let summary = engine.summarize(&account.id).unwrap();
//! assert_eq!(summary.available_to_spend_cents.raw(), 98_000);
//! ```

pub mod account;
pub mod bucket;
pub mod clock;
pub mod engine;
pub mod error;
pub mod event;
pub mod ids;
pub mod money;
pub mod store;

pub use account::Account;
pub use bucket::{AllocationType, BillCadence, BillRule, Bucket, BucketPatch, BucketSpec, BucketStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{AccountSummary, DepositReceipt, LedgerEngine, PurchaseRequest, RECENT_EVENT_LIMIT};
pub use error::{LedgerError, Result};
pub use event::{EventDetail, EventLog, LedgerEvent, LedgerEventKind, PurchaseMode};
pub use ids::{IdSource, SequentialIdSource, UuidSource};
pub use money::Cents;
pub use store::{
    EntityStore, JsonFilePersistence, LedgerSnapshot, MemoryPersistence, Persistence,
    PersistenceError,
};
