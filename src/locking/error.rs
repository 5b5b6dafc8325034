use thiserror::Error;

use crate::common::TransactionId;
use crate::locking::lock_type::LockType;
use crate::locking::resource::ResourceName;

/// Errors surfaced by the locking core. Mirrors `TransactionError`'s shape:
/// one variant per failure kind, each carrying enough context to build a
/// useful message without the caller re-deriving it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("transaction {transaction_id} already holds a lock on {resource} (requested {requested})")]
    DuplicateLockRequest {
        transaction_id: TransactionId,
        resource: ResourceName,
        requested: LockType,
    },

    #[error("transaction {transaction_id} holds no lock on {resource}")]
    NoLockHeld {
        transaction_id: TransactionId,
        resource: ResourceName,
    },

    #[error("invalid lock request by transaction {transaction_id} on {resource}: {reason}")]
    InvalidLock {
        transaction_id: TransactionId,
        resource: ResourceName,
        reason: String,
    },

    #[error("unsupported operation: {reason}")]
    UnsupportedOperation { reason: String },
}

impl LockError {
    pub fn duplicate(transaction_id: TransactionId, resource: ResourceName, requested: LockType) -> Self {
        LockError::DuplicateLockRequest {
            transaction_id,
            resource,
            requested,
        }
    }

    pub fn no_lock_held(transaction_id: TransactionId, resource: ResourceName) -> Self {
        LockError::NoLockHeld {
            transaction_id,
            resource,
        }
    }

    pub fn invalid(transaction_id: TransactionId, resource: ResourceName, reason: impl Into<String>) -> Self {
        LockError::InvalidLock {
            transaction_id,
            resource,
            reason: reason.into(),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        LockError::UnsupportedOperation { reason: reason.into() }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, LockError::DuplicateLockRequest { .. })
    }

    pub fn is_no_lock_held(&self) -> bool {
        matches!(self, LockError::NoLockHeld { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, LockError::InvalidLock { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, LockError::UnsupportedOperation { .. })
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            LockError::DuplicateLockRequest { transaction_id, .. }
            | LockError::NoLockHeld { transaction_id, .. }
            | LockError::InvalidLock { transaction_id, .. } => Some(*transaction_id),
            LockError::UnsupportedOperation { .. } => None,
        }
    }
}

pub type LockResult<T> = std::result::Result<T, LockError>;
