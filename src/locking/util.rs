use std::sync::Arc;

use crate::locking::context::LockContext;
use crate::locking::error::LockResult;
use crate::locking::lock_type::LockType;
use crate::locking::transaction::TransactionContext;

/// Ensures `transaction` holds at least `required` on `context`, acquiring
/// or promoting the necessary intent locks up the ancestor chain first.
/// Idempotent: calling this again with the same or weaker `required` is a
/// no-op once the first call has succeeded.
///
/// `required` is expected to be `S`, `X`, or `NL` (the declarative callers
/// this helper serves only ever need read, write, or "don't care" access);
/// `NL` is always satisfied trivially.
pub fn ensure_sufficient_lock_held(
    context: &Arc<LockContext>,
    transaction: &Arc<dyn TransactionContext>,
    required: LockType,
) -> LockResult<()> {
    if required == LockType::NL {
        return Ok(());
    }

    let txn_id = transaction.transaction_id();
    if LockType::substitutable(context.get_effective_lock_type(txn_id), required) {
        return Ok(());
    }

    let mut ancestors = Vec::new();
    let mut cur = context.parent();
    while let Some(p) = cur {
        ancestors.push(p.clone());
        cur = p.parent();
    }
    ancestors.reverse(); // root first, so each acquire sees its own parent already satisfied

    for ancestor in &ancestors {
        let held = ancestor.get_explicit_lock_type(txn_id);
        match (required, held) {
            (_, LockType::NL) => {
                let intent = if required == LockType::S { LockType::IS } else { LockType::IX };
                ancestor.acquire(transaction, intent)?;
            }
            (LockType::X, LockType::IS) => ancestor.promote(transaction, LockType::IX)?,
            (LockType::X, LockType::S) => ancestor.promote(transaction, LockType::SIX)?,
            // S only ever needs IS on an ancestor, and IS/IX/SIX/X already suffice for it;
            // X already suffices for X. Nothing further to do.
            _ => {}
        }
    }

    let explicit = context.get_explicit_lock_type(txn_id);
    match (required, explicit) {
        (_, LockType::NL) => context.acquire(transaction, required)?,
        (LockType::S, LockType::IX) => context.promote(transaction, LockType::SIX)?,
        (LockType::S, LockType::IS) | (LockType::X, LockType::IS) | (LockType::X, LockType::IX) => {
            context.escalate(transaction)?
        }
        (LockType::X, LockType::S) | (LockType::X, LockType::SIX) => context.promote(transaction, LockType::X)?,
        _ => {}
    }

    // `escalate` targets S or X depending on what was below it, which can
    // undershoot a required X (e.g. escalating an IS with no exclusive
    // descendants yields only S). Finish the climb with a promote.
    if !LockType::substitutable(context.get_explicit_lock_type(txn_id), required) {
        context.promote(transaction, required)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::manager::{LockManager, LockManagerConfig};
    use crate::locking::transaction::SimpleTransactionContext;

    fn ctx(id: u64) -> Arc<dyn TransactionContext> {
        SimpleTransactionContext::new(id) as Arc<dyn TransactionContext>
    }

    #[test]
    fn acquires_ancestor_intent_locks_automatically() {
        let mgr = LockManager::new(LockManagerConfig::default());
        let db = mgr.database_context();
        let table = db.child_context("orders");
        let page = table.child_context("page-1");
        let t1 = ctx(1);

        ensure_sufficient_lock_held(&page, &t1, LockType::S).unwrap();

        assert_eq!(db.get_explicit_lock_type(1), LockType::IS);
        assert_eq!(table.get_explicit_lock_type(1), LockType::IS);
        assert_eq!(page.get_explicit_lock_type(1), LockType::S);
    }

    #[test]
    fn is_idempotent() {
        let mgr = LockManager::new(LockManagerConfig::default());
        let db = mgr.database_context();
        let table = db.child_context("orders");
        let t1 = ctx(1);

        ensure_sufficient_lock_held(&table, &t1, LockType::S).unwrap();
        ensure_sufficient_lock_held(&table, &t1, LockType::S).unwrap();
        ensure_sufficient_lock_held(&table, &t1, LockType::NL).unwrap();
        assert_eq!(table.get_explicit_lock_type(1), LockType::S);
    }

    #[test]
    fn escalating_requirement_promotes_through_six() {
        let mgr = LockManager::new(LockManagerConfig::default());
        let db = mgr.database_context();
        let table = db.child_context("orders");
        let row = table.child_context("row-1");
        let t1 = ctx(1);

        ensure_sufficient_lock_held(&row, &t1, LockType::X).unwrap();
        assert_eq!(table.get_explicit_lock_type(1), LockType::IX);

        ensure_sufficient_lock_held(&table, &t1, LockType::S).unwrap();
        assert_eq!(table.get_explicit_lock_type(1), LockType::SIX);
    }
}
