//! Error types for the ledger engine.

use crate::money::Cents;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur during engine operation.
///
/// The three insufficient-funds variants are deliberately distinct so a
/// caller can tell the user exactly which ceiling was hit: the raw account
/// balance, the unlocked (available-to-spend) portion of it, or the pool of
/// the buckets named in a bucket-only purchase.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// No account exists with the given identifier
    #[error("account {account_id} not found")]
    AccountNotFound { account_id: String },

    /// No bucket exists with the given identifier
    #[error("bucket {bucket_id} not found")]
    BucketNotFound { bucket_id: String },

    /// A monetary amount was zero or negative
    #[error("amount must be positive, got {cents} cents")]
    InvalidAmount { cents: i64 },

    /// The account balance cannot cover the purchase at all
    #[error("insufficient account balance: requested {requested}, balance {balance}")]
    InsufficientBalance { requested: Cents, balance: Cents },

    /// Unlocked funds cannot cover a general purchase (locked funds are
    /// never implicitly spent)
    #[error("insufficient available funds: requested {requested}, available {available} (locked funds cannot be spent)")]
    InsufficientAvailableFunds { requested: Cents, available: Cents },

    /// The buckets named in a bucket-only purchase cannot cover the amount
    #[error("insufficient funds in specified buckets: requested {requested}, available {available}")]
    InsufficientBucketFunds { requested: Cents, available: Cents },

    /// A bucket-only purchase named no buckets
    #[error("no buckets specified for bucket-only purchase")]
    NoBucketsSpecified,

    /// A bucket with remaining funds cannot be deleted
    #[error("bucket {bucket_id} still holds {balance}; transfer funds out before deleting")]
    BucketHasBalance { bucket_id: String, balance: Cents },

    /// Lock request exceeds the bucket's unlocked balance
    #[error("cannot lock {requested}: only {available} unlocked in bucket")]
    LockExceedsAvailable { requested: Cents, available: Cents },

    /// Unlock request exceeds the bucket's locked balance
    #[error("cannot unlock {requested}: only {locked} locked in bucket")]
    UnlockExceedsLocked { requested: Cents, locked: Cents },

    /// Transfer endpoints belong to different accounts
    #[error("buckets {from_bucket_id} and {to_bucket_id} belong to different accounts")]
    CrossAccountTransfer {
        from_bucket_id: String,
        to_bucket_id: String,
    },

    /// Transfer amount exceeds the source bucket's unlocked balance
    #[error("insufficient unlocked funds in source bucket: requested {requested}, available {available}")]
    InsufficientUnlockedFunds { requested: Cents, available: Cents },

    /// The persistence collaborator rejected the commit; in-memory state
    /// has been rolled back
    #[error("storage error: {0}")]
    Storage(String),
}
