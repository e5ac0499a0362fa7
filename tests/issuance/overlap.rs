//! Critical Section Overlap Tests
//!
//! Instruments the lock with ProbeLock and the store with stale-write
//! detection. Under the safe issuer no two critical sections overlap, so
//! no save is ever computed from a stale read.

use crate::common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn safe_sections_never_overlap() {
    init_tracing();
    let store = Arc::new(MemoryRecordStore::with_latency(slow_io()));
    let id = store.insert("coupon", 20).unwrap().id();
    let lock = Arc::new(ProbeLock::new(LeaseLockService::new()));
    let issuer = SafeIssuer::with_options(Arc::clone(&store), Arc::clone(&lock), patient_options());

    let tally = tally(run_concurrently(32, |_| issuer.issue(id)));

    assert_eq!(tally.issued, 20);
    assert_eq!(tally.exhausted, 12);
    assert_eq!(lock.max_holders(), 1);
    assert_eq!(store.stale_writes(), 0);
    assert_eq!(store.find_by_id(id).unwrap().unwrap().consumed(), 20);
}

#[test]
fn distinct_stocks_do_not_contend() {
    init_tracing();
    let store = Arc::new(MemoryRecordStore::with_latency(slow_io()));
    let ids: Vec<_> = (0..4)
        .map(|n| store.insert(&format!("coupon-{}", n), 5).unwrap().id())
        .collect();
    let lock = Arc::new(LeaseLockService::new());
    let issuer = SafeIssuer::with_options(Arc::clone(&store), Arc::clone(&lock), patient_options());

    let tally = tally(run_concurrently(40, |i| issuer.issue(ids[i % ids.len()])));

    assert_eq!(tally.issued, 20);
    assert_eq!(tally.exhausted, 20);
    for id in ids {
        assert_eq!(store.find_by_id(id).unwrap().unwrap().remaining(), 0);
    }
    assert_eq!(store.stale_writes(), 0);
}

#[test]
fn unsafe_sections_do_overlap() {
    init_tracing();
    let store = Arc::new(MemoryRecordStore::with_latency(slow_io()));
    let id = store.insert("coupon", 1000).unwrap().id();
    let issuer = UnsafeIssuer::new(Arc::clone(&store));
    let inside = AtomicUsize::new(0);
    let max_inside = AtomicUsize::new(0);

    run_concurrently(16, |_| {
        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
        max_inside.fetch_max(now, Ordering::SeqCst);
        let result = issuer.attempt(id);
        inside.fetch_sub(1, Ordering::SeqCst);
        result
    });

    assert!(max_inside.load(Ordering::SeqCst) > 1);
    assert!(store.stale_writes() > 0);
}
