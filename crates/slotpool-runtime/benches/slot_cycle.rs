//! Slot acquire/release hot path.
//!
//! `reserve_release` is the bare CAS + counter cycle with no contention.
//! `await_free_slot` adds the waiter scan. `submit_noop` is a full round
//! trip through a worker thread.

use criterion::{criterion_group, criterion_main, Criterion};
use slotpool_core::id::PoolId;
use slotpool_core::layout::BufferLayout;
use slotpool_runtime::{
    new_wait_notify, CoordinationBuffer, PoolConfig, StatusTracker, TaskWaiter, WorkerPoolCoordinator,
};

use bytes::Bytes;
use std::hint::black_box;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

fn tracker(n: i64) -> Arc<StatusTracker> {
    let layout = BufferLayout::for_workers(n).unwrap();
    let buffer = Arc::new(CoordinationBuffer::allocate(layout, false).unwrap());
    Arc::new(StatusTracker::new(buffer, new_wait_notify()))
}

fn bench_reserve_release(c: &mut Criterion) {
    let t = tracker(16);
    c.bench_function("reserve_release", |b| {
        b.iter(|| {
            let won = t.try_set_busy(black_box(7));
            t.set_idle(7);
            won
        })
    });
}

fn bench_await_free_slot(c: &mut Criterion) {
    let t = tracker(16);
    // Leave only the last slot free so every call scans the whole array
    for slot in 0..15 {
        t.try_set_busy(slot);
    }
    let waiter = TaskWaiter::new(Arc::clone(&t), Arc::new(AtomicBool::new(false)), Duration::from_millis(10));
    c.bench_function("await_free_slot", |b| {
        b.iter(|| {
            let slot = waiter.await_free_slot(Duration::from_millis(100)).unwrap();
            t.set_idle(black_box(slot));
        })
    });
}

fn bench_submit_noop(c: &mut Criterion) {
    let config = PoolConfig::new().jitter(false);
    let pool = WorkerPoolCoordinator::create(PoolId::new(1), 4, config).unwrap();
    c.bench_function("submit_noop", |b| {
        b.iter(|| {
            pool.submit_fn("noop", || Ok(Bytes::new()), Duration::from_secs(1))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_reserve_release, bench_await_free_slot, bench_submit_noop);
criterion_main!(benches);
