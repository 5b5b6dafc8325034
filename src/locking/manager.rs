use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::common::TransactionId;
use crate::locking::context::LockContext;
use crate::locking::error::{LockError, LockResult};
use crate::locking::lock_type::LockType;
use crate::locking::request::{Lock, LockRequest, ResourceEntry};
use crate::locking::resource::ResourceName;
use crate::locking::transaction::TransactionContext;

/// Configuration for a [`LockManager`]. Deliberately sparse: deadlock
/// detection, lock timeouts, and persistence are out of scope for this
/// core, so there are no knobs for them here. Kept as a struct (rather than
/// a bare `LockManager::new()`) because every manager the caller builds is
/// expected to grow configuration over time.
#[derive(Debug, Clone)]
pub struct LockManagerConfig {
    /// Initial capacity hint for the resource table.
    pub resource_table_capacity_hint: usize,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        LockManagerConfig {
            resource_table_capacity_hint: 1024,
        }
    }
}

/// Observational counters. Never consulted when deciding whether to grant
/// a lock — only ever written to and read back.
#[derive(Debug, Default)]
pub struct LockManagerStats {
    acquires: AtomicU64,
    releases: AtomicU64,
    promotes: AtomicU64,
    blocks: AtomicU64,
}

impl LockManagerStats {
    fn record_acquire(&self) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
    }
    fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }
    fn record_promote(&self) {
        self.promotes.fetch_add(1, Ordering::Relaxed);
    }
    fn record_block(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn acquires(&self) -> u64 {
        self.acquires.load(Ordering::Relaxed)
    }
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }
    pub fn promotes(&self) -> u64 {
        self.promotes.load(Ordering::Relaxed)
    }
    pub fn blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    /// A serializable point-in-time snapshot, for exposing over a stats
    /// endpoint or dumping into a log line.
    pub fn snapshot(&self) -> LockManagerStatsSnapshot {
        LockManagerStatsSnapshot {
            acquires: self.acquires(),
            releases: self.releases(),
            promotes: self.promotes(),
            blocks: self.blocks(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LockManagerStatsSnapshot {
    pub acquires: u64,
    pub releases: u64,
    pub promotes: u64,
    pub blocks: u64,
}

struct ManagerState {
    resources: HashMap<ResourceName, ResourceEntry>,
    transaction_locks: HashMap<TransactionId, HashMap<ResourceName, LockType>>,
}

impl ManagerState {
    fn new(capacity_hint: usize) -> Self {
        ManagerState {
            resources: HashMap::with_capacity(capacity_hint),
            transaction_locks: HashMap::new(),
        }
    }

    fn remove_holder(&mut self, resource: &ResourceName, transaction_id: TransactionId) {
        if let Some(entry) = self.resources.get_mut(resource) {
            entry.holders.retain(|h| h.transaction_id != transaction_id);
        }
        if let Some(locks) = self.transaction_locks.get_mut(&transaction_id) {
            locks.remove(resource);
        }
    }
}

/// The flat lock manager: one FIFO wait queue per resource, and a global
/// transaction -> locks table. Every mutation to that shared state happens
/// while `state` is held; the lock is always released before a calling
/// thread is put to sleep in [`TransactionContext::block`].
///
/// `LockManager` also doubles as the factory for the hierarchical
/// [`LockContext`] tree layered on top of it: [`LockManager::context`] hands
/// out (and caches) one `LockContext` per resource name.
pub struct LockManager {
    state: Mutex<ManagerState>,
    contexts: DashMap<ResourceName, Arc<LockContext>>,
    stats: LockManagerStats,
}

impl LockManager {
    pub fn new(config: LockManagerConfig) -> Arc<Self> {
        Arc::new(LockManager {
            state: Mutex::new(ManagerState::new(config.resource_table_capacity_hint)),
            contexts: DashMap::new(),
            stats: LockManagerStats::default(),
        })
    }

    pub fn stats(&self) -> &LockManagerStats {
        &self.stats
    }

    /// The `LockContext` for the database root, creating it on first call.
    pub fn database_context(self: &Arc<Self>) -> Arc<LockContext> {
        self.context(ResourceName::root())
    }

    /// The `LockContext` for `name`, creating (and wiring up its parent
    /// chain) on first call.
    pub fn context(self: &Arc<Self>, name: ResourceName) -> Arc<LockContext> {
        if let Some(existing) = self.contexts.get(&name) {
            return existing.clone();
        }
        let parent = name.parent().map(|p| self.context(p));
        let ctx = LockContext::new(self.clone(), name.clone(), parent);
        self.contexts.entry(name).or_insert(ctx).clone()
    }

    /// The lock type `transaction_id` explicitly holds on `resource`, or
    /// `NL` if none.
    pub fn get_lock_type(&self, transaction_id: TransactionId, resource: &ResourceName) -> LockType {
        let state = self.state.lock();
        state
            .transaction_locks
            .get(&transaction_id)
            .and_then(|locks| locks.get(resource))
            .copied()
            .unwrap_or(LockType::NL)
    }

    /// All locks currently held by `transaction_id`.
    pub fn locks_held_by(&self, transaction_id: TransactionId) -> Vec<(ResourceName, LockType)> {
        let state = self.state.lock();
        state
            .transaction_locks
            .get(&transaction_id)
            .map(|locks| locks.iter().map(|(r, t)| (r.clone(), *t)).collect())
            .unwrap_or_default()
    }

    /// Acquires `lock_type` on `resource` for `transaction`. Blocks the
    /// calling thread if the request cannot be granted immediately.
    ///
    /// Errors without blocking and without mutating any state if the
    /// transaction already holds a lock on `resource`.
    pub fn acquire(
        &self,
        transaction: &Arc<dyn TransactionContext>,
        resource: &ResourceName,
        lock_type: LockType,
    ) -> LockResult<()> {
        let txn_id = transaction.transaction_id();
        tracing::debug!(transaction_id = txn_id, resource = %resource, lock_type = %lock_type, "acquire");

        let mut state = self.state.lock();
        if state
            .resources
            .get(resource)
            .and_then(|e| e.holder_lock(txn_id))
            .is_some()
        {
            return Err(LockError::duplicate(txn_id, resource.clone(), lock_type));
        }

        let entry = state.resources.entry(resource.clone()).or_default();
        if entry.waiters.is_empty() && entry.compatible_with_holders(lock_type, None) {
            entry.holders.push(Lock {
                transaction_id: txn_id,
                lock_type,
            });
            state
                .transaction_locks
                .entry(txn_id)
                .or_default()
                .insert(resource.clone(), lock_type);
            self.stats.record_acquire();
            return Ok(());
        }

        entry.waiters.push_back(LockRequest::new(transaction.clone(), lock_type));
        transaction.prepare_block();
        self.stats.record_block();
        drop(state);

        tracing::trace!(transaction_id = txn_id, resource = %resource, "blocking on acquire");
        transaction.block();
        Ok(())
    }

    /// Releases the lock `transaction` holds on `resource`.
    pub fn release(&self, transaction: &Arc<dyn TransactionContext>, resource: &ResourceName) -> LockResult<()> {
        let txn_id = transaction.transaction_id();
        tracing::debug!(transaction_id = txn_id, resource = %resource, "release");

        let mut state = self.state.lock();
        if state
            .resources
            .get(resource)
            .and_then(|e| e.holder_lock(txn_id))
            .is_none()
        {
            return Err(LockError::no_lock_held(txn_id, resource.clone()));
        }

        state.remove_holder(resource, txn_id);
        self.stats.record_release();

        let mut work = VecDeque::new();
        work.push_back(resource.clone());
        self.drain_queues(&mut state, work);
        Ok(())
    }

    /// Upgrades the lock `transaction` holds on `resource` to `new_lock_type`.
    /// Errors if no lock is held, if `new_lock_type` is not a valid upgrade,
    /// or if it is a no-op (promoting to the type already held).
    pub fn promote(
        &self,
        transaction: &Arc<dyn TransactionContext>,
        resource: &ResourceName,
        new_lock_type: LockType,
    ) -> LockResult<()> {
        let txn_id = transaction.transaction_id();
        tracing::debug!(transaction_id = txn_id, resource = %resource, new_lock_type = %new_lock_type, "promote");

        let mut state = self.state.lock();
        let held = state
            .resources
            .get(resource)
            .and_then(|e| e.holder_lock(txn_id))
            .ok_or_else(|| LockError::no_lock_held(txn_id, resource.clone()))?;

        if held == new_lock_type {
            return Err(LockError::duplicate(txn_id, resource.clone(), new_lock_type));
        }
        if !LockType::substitutable(new_lock_type, held) {
            return Err(LockError::invalid(
                txn_id,
                resource.clone(),
                format!("{new_lock_type} does not substitute for currently-held {held}"),
            ));
        }

        // Unlike a plain acquire, promote's immediate-grant check does not
        // require the queue to be empty: a transaction promoting a lock it
        // already holds is not a new entrant competing with queued
        // requests, it only needs to be compatible with current holders.
        let entry = state.resources.get_mut(resource).expect("checked above");
        if entry.compatible_with_holders(new_lock_type, Some(txn_id)) {
            entry.holders.retain(|h| h.transaction_id != txn_id);
            entry.holders.push(Lock {
                transaction_id: txn_id,
                lock_type: new_lock_type,
            });
            state
                .transaction_locks
                .entry(txn_id)
                .or_default()
                .insert(resource.clone(), new_lock_type);
            self.stats.record_promote();
            return Ok(());
        }

        // Can't grant immediately: queue at the FRONT, ahead of plain
        // acquires, so a transaction already holding a lock is never stuck
        // behind new arrivals.
        entry
            .waiters
            .push_front(LockRequest::new(transaction.clone(), new_lock_type));
        transaction.prepare_block();
        self.stats.record_block();
        drop(state);

        tracing::trace!(transaction_id = txn_id, resource = %resource, "blocking on promote");
        transaction.block();
        Ok(())
    }

    /// Atomically acquires `new_lock_type` on `resource` while releasing
    /// every resource in `release_locks` (which may include `resource`
    /// itself). All of `release_locks` must currently be held by
    /// `transaction`, or the whole call fails without mutating anything.
    pub fn acquire_and_release(
        &self,
        transaction: &Arc<dyn TransactionContext>,
        resource: &ResourceName,
        new_lock_type: LockType,
        release_locks: Vec<ResourceName>,
    ) -> LockResult<()> {
        let txn_id = transaction.transaction_id();
        tracing::debug!(
            transaction_id = txn_id,
            resource = %resource,
            new_lock_type = %new_lock_type,
            "acquire_and_release"
        );

        let mut state = self.state.lock();
        let already_held = state.resources.get(resource).and_then(|e| e.holder_lock(txn_id));
        if already_held.is_some() && !release_locks.contains(resource) {
            return Err(LockError::duplicate(txn_id, resource.clone(), new_lock_type));
        }

        for r in &release_locks {
            if state.resources.get(r).and_then(|e| e.holder_lock(txn_id)).is_none() {
                return Err(LockError::no_lock_held(txn_id, r.clone()));
            }
        }

        // Unlike a plain acquire, the immediate-grant check here does not
        // require the queue to be empty (see `promote`): only compatibility
        // with other transactions' holders matters.
        let entry = state.resources.entry(resource.clone()).or_default();
        let excluding = if already_held.is_some() { Some(txn_id) } else { None };
        if entry.compatible_with_holders(new_lock_type, excluding) {
            entry.holders.retain(|h| h.transaction_id != txn_id);
            entry.holders.push(Lock {
                transaction_id: txn_id,
                lock_type: new_lock_type,
            });
            state
                .transaction_locks
                .entry(txn_id)
                .or_default()
                .insert(resource.clone(), new_lock_type);

            let mut work = VecDeque::new();
            for r in &release_locks {
                if r != resource {
                    state.remove_holder(r, txn_id);
                    work.push_back(r.clone());
                }
            }
            self.stats.record_acquire();
            self.drain_queues(&mut state, work);
            return Ok(());
        }

        let entry = state.resources.get_mut(resource).expect("checked above");
        entry.waiters.push_front(
            LockRequest::new(transaction.clone(), new_lock_type).with_released_locks(release_locks),
        );
        transaction.prepare_block();
        self.stats.record_block();
        drop(state);

        tracing::trace!(transaction_id = txn_id, resource = %resource, "blocking on acquire_and_release");
        transaction.block();
        Ok(())
    }

    /// Processes every resource in `work` whose holder set just shrank,
    /// granting as many front-of-queue waiters as are now compatible.
    /// Implemented over an explicit work list rather than recursion: a
    /// granted `acquire_and_release` can itself free up other resources,
    /// which enqueues more work here instead of a nested call.
    fn drain_queues(&self, state: &mut ManagerState, mut work: VecDeque<ResourceName>) {
        while let Some(resource) = work.pop_front() {
            loop {
                let Some(entry) = state.resources.get_mut(&resource) else {
                    break;
                };
                let Some(front) = entry.waiters.front() else {
                    break;
                };
                let txn_id = front.transaction_id();
                let lock_type = front.lock.lock_type;
                if !entry.compatible_with_holders(lock_type, Some(txn_id)) {
                    break;
                }

                let req = entry.waiters.pop_front().expect("front checked above");
                entry.holders.retain(|h| h.transaction_id != txn_id);
                entry.holders.push(Lock {
                    transaction_id: txn_id,
                    lock_type,
                });
                state
                    .transaction_locks
                    .entry(txn_id)
                    .or_default()
                    .insert(resource.clone(), lock_type);
                self.stats.record_acquire();

                for rel in &req.released_locks {
                    if *rel != resource {
                        state.remove_holder(rel, txn_id);
                        work.push_back(rel.clone());
                    }
                }

                tracing::trace!(transaction_id = txn_id, resource = %resource, lock_type = %lock_type, "granted from queue");
                req.transaction.unblock();
            }
        }
    }
}
