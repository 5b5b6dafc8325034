use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::common::TransactionId;
use crate::locking::error::{LockError, LockResult};
use crate::locking::lock_type::LockType;
use crate::locking::manager::LockManager;
use crate::locking::resource::ResourceName;
use crate::locking::transaction::TransactionContext;

/// A node in the hierarchical lock context tree. Each node wraps the flat
/// [`LockManager`] operations for one resource and enforces the
/// multigranular invariants around it: a lock can only be taken here if the
/// parent already holds an appropriate intent lock, and this context can't
/// be released out from under locks still held on its descendants.
pub struct LockContext {
    lock_manager: Arc<LockManager>,
    name: ResourceName,
    parent: Option<Arc<LockContext>>,
    /// Per-transaction count of locks held anywhere in this context's
    /// subtree (not counting a lock on this context itself). Maintained by
    /// every acquire/release/escalate that touches a descendant, via
    /// `adjust_ancestor_counts` walking the full ancestor chain.
    num_child_locks: DashMap<TransactionId, u32>,
    /// Set for contexts representing a resource that must never be locked
    /// directly (B+ tree indices, temp tables) — every mutating call here
    /// fails with `UnsupportedOperation` instead of touching the manager.
    readonly: AtomicBool,
    /// Once set, every child context created from this point on is born
    /// read-only. Does not retroactively affect already-created children.
    disable_children: AtomicBool,
}

impl fmt::Debug for LockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockContext")
            .field("name", &self.name.to_string())
            .field("tracked_transactions", &self.num_child_locks.len())
            .field("readonly", &self.readonly.load(Ordering::Relaxed))
            .finish()
    }
}

impl LockContext {
    pub(crate) fn new(
        lock_manager: Arc<LockManager>,
        name: ResourceName,
        parent: Option<Arc<LockContext>>,
    ) -> Arc<Self> {
        let readonly = parent
            .as_ref()
            .map(|p| p.disable_children.load(Ordering::Relaxed))
            .unwrap_or(false);
        Arc::new(LockContext {
            lock_manager,
            name,
            parent,
            num_child_locks: DashMap::new(),
            readonly: AtomicBool::new(readonly),
            disable_children: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    pub fn parent(&self) -> Option<Arc<LockContext>> {
        self.parent.clone()
    }

    /// The context for `self`'s child named `segment`, creating it on
    /// first access.
    pub fn child_context(self: &Arc<Self>, segment: impl Into<String>) -> Arc<LockContext> {
        self.lock_manager.context(self.name.child(segment))
    }

    /// Marks every child context created from now on as read-only. Used for
    /// resources whose internal structure (B+ tree indices, temp tables)
    /// should never be locked directly by callers.
    pub fn disable_child_locks(&self) {
        self.disable_children.store(true, Ordering::Relaxed);
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly.load(Ordering::Relaxed)
    }

    fn check_writable(&self, reason: &str) -> LockResult<()> {
        if self.readonly.load(Ordering::Relaxed) {
            return Err(LockError::unsupported(format!(
                "{reason} on read-only context {}",
                self.name
            )));
        }
        Ok(())
    }

    /// The lock `transaction_id` holds directly on this resource, or `NL`.
    pub fn get_explicit_lock_type(&self, transaction_id: TransactionId) -> LockType {
        self.lock_manager.get_lock_type(transaction_id, &self.name)
    }

    /// The access `transaction_id` effectively has at this resource once
    /// ancestor locks are taken into account — e.g. a transaction holding
    /// `X` on the parent table has effective `X` on every page, even
    /// without an explicit lock there.
    pub fn get_effective_lock_type(&self, transaction_id: TransactionId) -> LockType {
        let explicit = self.get_explicit_lock_type(transaction_id);
        if explicit != LockType::NL {
            return explicit;
        }
        match &self.parent {
            None => LockType::NL,
            Some(parent) => match parent.get_effective_lock_type(transaction_id) {
                t @ (LockType::S | LockType::X) => t,
                LockType::SIX => LockType::S,
                _ => LockType::NL,
            },
        }
    }

    /// Number of locks `transaction_id` holds anywhere below this context.
    pub fn get_num_children(&self, transaction_id: TransactionId) -> u32 {
        self.num_child_locks.get(&transaction_id).map(|v| *v).unwrap_or(0)
    }

    pub fn acquire(&self, transaction: &Arc<dyn TransactionContext>, lock_type: LockType) -> LockResult<()> {
        self.check_writable("acquire")?;
        let txn_id = transaction.transaction_id();
        if let Some(parent) = &self.parent {
            let parent_lock = parent.get_explicit_lock_type(txn_id);
            if !LockType::can_be_parent_lock(parent_lock, lock_type) {
                return Err(LockError::invalid(
                    txn_id,
                    self.name.clone(),
                    format!(
                        "parent {} holds {parent_lock}, which cannot support a child lock of {lock_type}",
                        parent.name
                    ),
                ));
            }
        }
        self.lock_manager.acquire(transaction, &self.name, lock_type)?;
        self.adjust_ancestor_counts(txn_id, 1);
        Ok(())
    }

    pub fn release(&self, transaction: &Arc<dyn TransactionContext>) -> LockResult<()> {
        self.check_writable("release")?;
        let txn_id = transaction.transaction_id();
        if self.get_num_children(txn_id) > 0 {
            return Err(LockError::invalid(
                txn_id,
                self.name.clone(),
                "cannot release while descendant locks are still held",
            ));
        }
        self.lock_manager.release(transaction, &self.name)?;
        self.adjust_ancestor_counts(txn_id, -1);
        Ok(())
    }

    /// Upgrades the lock held at this context. Promoting to `SIX` from
    /// `IS`/`IX` additionally releases every redundant `S`/`IS` lock the
    /// transaction holds on a descendant, since `SIX` already implies them.
    pub fn promote(&self, transaction: &Arc<dyn TransactionContext>, new_lock_type: LockType) -> LockResult<()> {
        self.check_writable("promote")?;
        let txn_id = transaction.transaction_id();
        let held = self.get_explicit_lock_type(txn_id);
        if held == LockType::NL {
            return Err(LockError::no_lock_held(txn_id, self.name.clone()));
        }

        if new_lock_type == LockType::SIX && matches!(held, LockType::IS | LockType::IX | LockType::S) {
            if self.has_ancestor_six(txn_id) {
                return Err(LockError::invalid(
                    txn_id,
                    self.name.clone(),
                    "an ancestor already holds SIX, promoting here would be redundant",
                ));
            }
            let redundant = self.redundant_descendant_locks(txn_id);
            let mut release = redundant.clone();
            release.push(self.name.clone());
            self.lock_manager
                .acquire_and_release(transaction, &self.name, LockType::SIX, release)?;
            for r in &redundant {
                self.lock_manager.context(r.clone()).adjust_ancestor_counts(txn_id, -1);
            }
            return Ok(());
        }

        self.lock_manager.promote(transaction, &self.name, new_lock_type)
    }

    /// Collapses every lock the transaction holds in this subtree into a
    /// single lock at this context, releasing all the descendant locks.
    pub fn escalate(&self, transaction: &Arc<dyn TransactionContext>) -> LockResult<()> {
        self.check_writable("escalate")?;
        let txn_id = transaction.transaction_id();
        let held = self.get_explicit_lock_type(txn_id);
        let descendants: Vec<(ResourceName, LockType)> = self
            .lock_manager
            .locks_held_by(txn_id)
            .into_iter()
            .filter(|(r, _)| *r != self.name && r.is_descendant_of(&self.name))
            .collect();

        if held == LockType::NL && descendants.is_empty() {
            return Err(LockError::no_lock_held(txn_id, self.name.clone()));
        }

        let needs_exclusive = matches!(held, LockType::X | LockType::IX | LockType::SIX)
            || descendants
                .iter()
                .any(|(_, t)| matches!(t, LockType::X | LockType::IX | LockType::SIX));
        let target = if needs_exclusive { LockType::X } else { LockType::S };

        if matches!(held, LockType::S | LockType::X) && descendants.is_empty() {
            // Already fully escalated: idempotent no-op, not an error.
            return Ok(());
        }

        let mut release: Vec<ResourceName> = descendants.iter().map(|(r, _)| r.clone()).collect();
        release.push(self.name.clone());
        self.lock_manager
            .acquire_and_release(transaction, &self.name, target, release)?;

        for (r, _) in &descendants {
            self.lock_manager.context(r.clone()).adjust_ancestor_counts(txn_id, -1);
        }
        Ok(())
    }

    fn has_ancestor_six(&self, transaction_id: TransactionId) -> bool {
        let mut cur = self.parent.clone();
        while let Some(p) = cur {
            if p.get_explicit_lock_type(transaction_id) == LockType::SIX {
                return true;
            }
            cur = p.parent.clone();
        }
        false
    }

    fn redundant_descendant_locks(&self, transaction_id: TransactionId) -> Vec<ResourceName> {
        self.lock_manager
            .locks_held_by(transaction_id)
            .into_iter()
            .filter(|(r, t)| *r != self.name && r.is_descendant_of(&self.name) && matches!(t, LockType::S | LockType::IS))
            .map(|(r, _)| r)
            .collect()
    }

    fn adjust_ancestor_counts(&self, transaction_id: TransactionId, delta: i32) {
        let mut cur = self.parent.clone();
        while let Some(p) = cur {
            let mut entry = p.num_child_locks.entry(transaction_id).or_insert(0);
            if delta >= 0 {
                *entry += delta as u32;
            } else {
                *entry = entry.saturating_sub((-delta) as u32);
            }
            drop(entry);
            cur = p.parent.clone();
        }
    }
}
