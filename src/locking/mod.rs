//! Multigranular lock manager.
//!
//! ```text
//!   LockManager  --------- flat engine: per-resource FIFO wait queues,
//!        |                 global transaction -> locks table
//!        |
//!        +--> context(name) --------- LockContext tree: one node per
//!                                     resource, enforcing parent/child
//!                                     lock validity and subtree counts
//! ```
//!
//! [`manager::LockManager`] is both the flat engine (`acquire`/`release`/
//! `promote`/`acquire_and_release`) and the factory for the hierarchical
//! [`context::LockContext`] tree built on top of it. Most callers only need
//! [`util::ensure_sufficient_lock_held`], which walks the tree acquiring
//! whatever ancestor intent locks a request needs.
//!
//! Deadlock detection, lock timeouts, and crash persistence are out of
//! scope — this is the mechanism a transaction manager layers those
//! policies on top of, not a replacement for one.

pub mod context;
pub mod error;
pub mod lock_type;
pub mod manager;
pub mod request;
pub mod resource;
pub mod transaction;
pub mod util;

pub use context::LockContext;
pub use error::{LockError, LockResult};
pub use lock_type::LockType;
pub use manager::{LockManager, LockManagerConfig, LockManagerStats, LockManagerStatsSnapshot};
pub use resource::ResourceName;
pub use transaction::{SimpleTransactionContext, TransactionContext};
pub use util::ensure_sufficient_lock_held;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn end_to_end_quick_start() {
        let manager = LockManager::new(LockManagerConfig::default());
        let db = manager.database_context();
        let table = db.child_context("accounts");

        let t1 = SimpleTransactionContext::new(1) as Arc<dyn TransactionContext>;
        ensure_sufficient_lock_held(&table, &t1, LockType::X).unwrap();

        assert_eq!(table.get_explicit_lock_type(1), LockType::X);
        table.release(&t1).unwrap();
        db.release(&t1).unwrap();
    }
}
