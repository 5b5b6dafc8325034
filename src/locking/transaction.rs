use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

use crate::common::TransactionId;

/// The manager's view of a transaction: just enough to block the calling
/// thread until the manager grants a queued request, and to wake it back up
/// once it does.
///
/// `prepare_block` is always called while the manager's internal mutex is
/// still held, so it must not block. `block` is called after that mutex is
/// released, and is where the calling thread actually waits. `unblock` is
/// called by whichever thread processes the queue and grants the request —
/// it may run before, during, or after `block`, so it must be safe to call
/// at any point relative to `block` without losing the wakeup.
pub trait TransactionContext: Send + Sync {
    fn transaction_id(&self) -> TransactionId;

    /// Arms the transaction to receive a wakeup. Called with the manager
    /// lock held, before it is released and the request is queued.
    fn prepare_block(&self);

    /// Blocks the calling thread until `unblock` has been called at least
    /// once since the matching `prepare_block`. Must return immediately if
    /// `unblock` already ran.
    fn block(&self);

    /// Wakes a thread parked in `block` (or arranges for it not to park at
    /// all, if called first). Idempotent.
    fn unblock(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Idle,
    Armed,
    Woken,
}

/// Straightforward semaphore-like `TransactionContext`, backed by a
/// `parking_lot` mutex/condvar pair. One instance per transaction.
#[derive(Debug)]
pub struct SimpleTransactionContext {
    transaction_id: TransactionId,
    state: Mutex<BlockState>,
    condvar: Condvar,
}

impl SimpleTransactionContext {
    pub fn new(transaction_id: TransactionId) -> Arc<Self> {
        Arc::new(SimpleTransactionContext {
            transaction_id,
            state: Mutex::new(BlockState::Idle),
            condvar: Condvar::new(),
        })
    }
}

impl TransactionContext for SimpleTransactionContext {
    fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    fn prepare_block(&self) {
        let mut state = self.state.lock();
        *state = BlockState::Armed;
    }

    fn block(&self) {
        let mut state = self.state.lock();
        while *state == BlockState::Armed {
            self.condvar.wait(&mut state);
        }
        *state = BlockState::Idle;
    }

    fn unblock(&self) {
        let mut state = self.state.lock();
        *state = BlockState::Woken;
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn unblock_before_block_does_not_deadlock() {
        let ctx = SimpleTransactionContext::new(1);
        ctx.prepare_block();
        ctx.unblock();
        ctx.block(); // must return immediately, no lost wakeup
    }

    #[test]
    fn block_then_unblock_from_another_thread() {
        let ctx = SimpleTransactionContext::new(1);
        ctx.prepare_block();

        let ctx2 = ctx.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            ctx2.unblock();
        });

        ctx.block();
        handle.join().unwrap();
    }
}
