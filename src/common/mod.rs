//! Shared identifier types used across the locking core.

/// Unique identifier for a transaction.
pub type TransactionId = u64;
