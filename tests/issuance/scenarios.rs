//! Capacity Scenarios
//!
//! The four reference scenarios from the request layer:
//! - One caller against a large pool
//! - A thousand concurrent callers against a pool of one hundred
//! - A pool with no capacity
//! - Two callers racing for the last unit

use crate::common::*;

// ============================================================================
// Single Caller
// ============================================================================

#[test]
fn single_caller_issues_one_unit() {
    let (service, _, lock) = service_with(IoLatency::NONE, patient_options());
    let id = service.create_stock("spring sale", 100).unwrap().id();

    let report = service.issue_safe(id).unwrap();

    assert!(report.success);
    assert_eq!(report.outcome, IssueOutcome::Issued);
    assert_eq!(report.issued_count, 1);
    assert_eq!(report.remaining, 99);
    assert_eq!(lock.active_leases(), 0);
}

// ============================================================================
// Thousand Callers
// ============================================================================

#[test]
fn thousand_callers_never_exceed_capacity() {
    let (service, store, lock) = service_with(IoLatency::NONE, LockOptions::default());
    let id = service.create_stock("spring sale", 100).unwrap().id();

    let report = service.stress_test(id, Strategy::Safe, 1000).unwrap();

    assert_eq!(report.errors, 0, "first error: {:?}", report.first_error);
    assert_eq!(report.outcomes.total(), 1000);
    assert!(report.outcomes.issued <= 100);
    assert_eq!(u64::from(report.issued_count), report.outcomes.issued);
    assert!(report.is_consistent());
    assert_eq!(store.stale_writes(), 0);
    assert_eq!(lock.active_leases(), 0);

    let record = service.get_stock(id).unwrap();
    assert!(record.is_consistent());
    assert!(record.consumed() <= record.capacity());
}

#[test]
fn thousand_patient_callers_drain_exactly() {
    let (service, _, _) = service_with(IoLatency::NONE, patient_options());
    let id = service.create_stock("spring sale", 100).unwrap().id();

    let report = service.stress_test(id, Strategy::Safe, 1000).unwrap();

    assert_eq!(report.outcomes.lock_timeouts, 0);
    assert_eq!(report.outcomes.issued, 100);
    assert_eq!(report.outcomes.exhausted, 900);
    assert_eq!(report.remaining, 0);
}

// ============================================================================
// Empty Pool
// ============================================================================

#[test]
fn empty_pool_rejects_every_strategy() {
    let (service, store, _) = service_with(IoLatency::NONE, patient_options());
    let id = service.create_stock("sold out", 0).unwrap().id();

    for strategy in [Strategy::Safe, Strategy::Unsafe] {
        let report = service.issue(id, strategy).unwrap();
        assert!(!report.success);
        assert_eq!(report.outcome, IssueOutcome::Exhausted);
        assert_eq!(report.issued_count, 0);
    }

    let report = service.stress_test(id, Strategy::Safe, 20).unwrap();
    assert_eq!(report.outcomes.exhausted, 20);
    assert_eq!(report.issued_count, 0);
    assert_eq!(store.stale_writes(), 0);
}

// ============================================================================
// Last Unit
// ============================================================================

#[test]
fn two_callers_one_unit_exactly_one_wins() {
    let (service, _, _) = service_with(slow_io(), patient_options());
    let id = service.create_stock("last one", 1).unwrap().id();

    let results = run_concurrently(2, |_| service.issue_safe(id).map(|r| r.outcome));
    let tally = tally(results);

    assert_eq!(tally.issued, 1);
    assert_eq!(tally.exhausted, 1);
    assert_eq!(service.get_stock(id).unwrap().remaining(), 0);
}
