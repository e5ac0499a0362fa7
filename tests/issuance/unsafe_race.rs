//! Unsafe Issuer Race Tests
//!
//! The uncoordinated issuer reads, checks and writes with no exclusion.
//! With store latency widening the window, callers that read the same
//! snapshot all pass the capacity check. These tests reproduce that, they
//! do not prevent it.
//!
//! - Replace writes: the race shows as successes beyond capacity and lost updates
//! - Increment writes: the race lands in the stored record as consumed > capacity

use crate::common::*;
use std::sync::Arc;

const ATTEMPTS: usize = 5;

#[test]
fn unsafe_issuer_over_issues_under_contention() {
    let mut observed = Vec::new();

    for _ in 0..ATTEMPTS {
        let (service, store, _) = service_with(slow_io(), patient_options());
        let id = service.create_stock("flash", 5).unwrap().id();

        let report = service.stress_test(id, Strategy::Unsafe, 64).unwrap();
        assert_eq!(report.errors, 0, "first error: {:?}", report.first_error);
        assert_eq!(report.outcomes.total(), 64);

        observed.push((report.outcomes.issued, store.stale_writes()));
        if report.over_issued > 0 {
            assert!(report.outcomes.issued > 5);
            assert!(!report.is_consistent());
            assert!(store.stale_writes() > 0);
            return;
        }
    }
    panic!(
        "no over-issuance in {} runs (issued, stale writes): {:?}",
        ATTEMPTS, observed
    );
}

#[test]
fn unsafe_race_shows_as_lost_updates() {
    init_tracing();
    for _ in 0..ATTEMPTS {
        let store = Arc::new(MemoryRecordStore::with_latency(slow_io()));
        let id = store.insert("flash", 1000).unwrap().id();
        let issuer = UnsafeIssuer::new(Arc::clone(&store));

        let results = run_concurrently(32, |_| issuer.attempt(id));
        let tally = tally(results);
        assert_eq!(tally.issued, 32);

        let consumed = store.find_by_id(id).unwrap().unwrap().consumed();
        if u64::from(consumed) < tally.issued {
            assert!(store.stale_writes() > 0);
            return;
        }
    }
    panic!("no lost update in {} runs", ATTEMPTS);
}

/// Service over a store that applies each save as `consumed + pending claims`.
fn incrementing_service() -> (
    StockService<MemoryRecordStore, LeaseLockService>,
    Arc<MemoryRecordStore>,
) {
    init_tracing();
    let store =
        Arc::new(MemoryRecordStore::with_latency(slow_io()).with_write_mode(WriteMode::Increment));
    let service = StockService::new(
        Arc::clone(&store),
        Arc::new(LeaseLockService::new()),
        patient_options(),
    );
    (service, store)
}

#[test]
fn unsafe_race_oversells_stored_record_with_increment_writes() {
    let mut observed = Vec::new();

    for _ in 0..ATTEMPTS {
        let (service, store) = incrementing_service();
        let id = service.create_stock("flash", 5).unwrap().id();

        let report = service.stress_test(id, Strategy::Unsafe, 64).unwrap();
        assert_eq!(report.errors, 0, "first error: {:?}", report.first_error);

        let stored = store.find_by_id(id).unwrap().unwrap();
        observed.push(stored.consumed());
        if stored.consumed() > stored.capacity() {
            assert!(!stored.is_consistent());
            assert!(stored.remaining() < 0);
            assert_eq!(report.issued_count, stored.consumed());
            assert!(report.over_issued > 0);
            // Every success reached the record
            assert_eq!(report.lost_updates, 0);
            return;
        }
    }
    panic!(
        "stored consumed never passed capacity in {} runs: {:?}",
        ATTEMPTS, observed
    );
}

#[test]
fn safe_issuer_with_increment_writes_stays_within_capacity() {
    let (service, store) = incrementing_service();
    let id = service.create_stock("flash", 5).unwrap().id();

    let report = service.stress_test(id, Strategy::Safe, 64).unwrap();

    assert_eq!(report.outcomes.issued, 5);
    assert_eq!(report.issued_count, 5);
    assert!(report.is_consistent());
    assert_eq!(store.stale_writes(), 0);
}

#[test]
fn safe_issuer_on_same_workload_is_exact() {
    let (service, store, _) = service_with(slow_io(), patient_options());
    let id = service.create_stock("flash", 5).unwrap().id();

    let report = service.stress_test(id, Strategy::Safe, 64).unwrap();

    assert_eq!(report.outcomes.issued, 5);
    assert_eq!(report.outcomes.exhausted, 59);
    assert_eq!(report.issued_count, 5);
    assert!(report.is_consistent());
    assert_eq!(store.stale_writes(), 0);
}

#[test]
fn sequential_unsafe_issues_are_correct() {
    // Without contention the baseline is indistinguishable from the safe path.
    let (service, store, _) = service_with(IoLatency::NONE, patient_options());
    let id = service.create_stock("flash", 3).unwrap().id();

    let outcomes: Vec<_> = (0..5)
        .map(|_| service.issue_unsafe(id).unwrap().success)
        .collect();

    assert_eq!(outcomes, vec![true, true, true, false, false]);
    assert_eq!(store.stale_writes(), 0);
}
