use std::sync::Arc;

use crate::common::TransactionId;
use crate::locking::lock_type::LockType;
use crate::locking::resource::ResourceName;
use crate::locking::transaction::TransactionContext;

/// A single granted lock: who holds it, and at what strength.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    pub transaction_id: TransactionId,
    pub lock_type: LockType,
}

/// A request sitting in a resource's wait queue.
///
/// `released_locks` is non-empty only for `promote`/`acquire_and_release`
/// requests that block: it records the resources the transaction asked to
/// give up at the same time it is granted `lock`, so the grant and the
/// releases can be applied as a single atomic step once the request reaches
/// the front of the queue and its new lock is compatible with the current
/// holders.
#[derive(Clone)]
pub struct LockRequest {
    pub transaction: Arc<dyn TransactionContext>,
    pub lock: Lock,
    pub released_locks: Vec<ResourceName>,
}

impl std::fmt::Debug for LockRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockRequest")
            .field("transaction_id", &self.transaction_id())
            .field("lock", &self.lock)
            .field("released_locks", &self.released_locks)
            .finish()
    }
}

impl LockRequest {
    pub fn new(transaction: Arc<dyn TransactionContext>, lock_type: LockType) -> Self {
        let transaction_id = transaction.transaction_id();
        LockRequest {
            transaction,
            lock: Lock {
                transaction_id,
                lock_type,
            },
            released_locks: Vec::new(),
        }
    }

    pub fn with_released_locks(mut self, released: Vec<ResourceName>) -> Self {
        self.released_locks = released;
        self
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.lock.transaction_id
    }
}

/// Per-resource table entry: who currently holds a lock, and who is
/// waiting, in strict FIFO order.
#[derive(Debug, Default)]
pub struct ResourceEntry {
    pub holders: Vec<Lock>,
    pub waiters: std::collections::VecDeque<LockRequest>,
}

impl ResourceEntry {
    /// Whether `lock_type` is compatible with every current holder other
    /// than `excluding` (used when a transaction already holds a weaker
    /// lock on the same resource and is trying to promote it).
    pub fn compatible_with_holders(&self, lock_type: LockType, excluding: Option<TransactionId>) -> bool {
        self.holders
            .iter()
            .filter(|h| Some(h.transaction_id) != excluding)
            .all(|h| h.lock_type.compatible(lock_type))
    }

    pub fn holder_lock(&self, transaction_id: TransactionId) -> Option<LockType> {
        self.holders
            .iter()
            .find(|h| h.transaction_id == transaction_id)
            .map(|h| h.lock_type)
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty() && self.waiters.is_empty()
    }
}
