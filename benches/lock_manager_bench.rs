// Lock manager performance benchmarks.
// Uncontended acquire/release throughput, promote-in-place cost, and
// hierarchical acquire through ensure_sufficient_lock_held.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rusty_lockdb::locking::{
    ensure_sufficient_lock_held, LockManager, LockManagerConfig, LockType, SimpleTransactionContext,
    TransactionContext,
};
use std::sync::Arc;

fn bench_flat_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_acquire_release");

    let lock_types = vec![LockType::IS, LockType::IX, LockType::S, LockType::X];

    for lock_type in lock_types {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{lock_type}")),
            &lock_type,
            |b, &lock_type| {
                let manager = LockManager::new(LockManagerConfig::default());
                let resource = rusty_lockdb::locking::ResourceName::root();

                let mut next_id = 0u64;
                b.iter(|| {
                    next_id += 1;
                    let txn = SimpleTransactionContext::new(next_id) as Arc<dyn TransactionContext>;
                    manager.acquire(&txn, &resource, lock_type).unwrap();
                    manager.release(&txn, &resource).unwrap();
                    black_box(next_id);
                });
            },
        );
    }

    group.finish();
}

fn bench_promote_uncontended(c: &mut Criterion) {
    c.bench_function("promote_s_to_x_uncontended", |b| {
        let manager = LockManager::new(LockManagerConfig::default());
        let resource = rusty_lockdb::locking::ResourceName::root();
        let mut next_id = 0u64;

        b.iter(|| {
            next_id += 1;
            let txn = SimpleTransactionContext::new(next_id) as Arc<dyn TransactionContext>;
            manager.acquire(&txn, &resource, LockType::S).unwrap();
            manager.promote(&txn, &resource, LockType::X).unwrap();
            manager.release(&txn, &resource).unwrap();
        });
    });
}

fn bench_hierarchical_acquire(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchical_acquire");

    for depth in [1usize, 3, 6] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let manager = LockManager::new(LockManagerConfig::default());
            let mut chain = vec![manager.database_context()];
            for i in 0..depth {
                let next = chain.last().unwrap().child_context(format!("level-{i}"));
                chain.push(next);
            }
            let leaf = chain.last().unwrap().clone();
            let mut next_id = 0u64;

            b.iter(|| {
                next_id += 1;
                let txn = SimpleTransactionContext::new(next_id) as Arc<dyn TransactionContext>;
                ensure_sufficient_lock_held(&leaf, &txn, LockType::X).unwrap();
                for ctx in chain.iter().rev() {
                    ctx.release(&txn).unwrap();
                }
                black_box(next_id);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_flat_acquire_release,
    bench_promote_uncontended,
    bench_hierarchical_acquire
);
criterion_main!(benches);
