//! Cancellation Tests
//!
//! Cancelling a waiter abandons the acquisition: the critical section is
//! never entered and no lease is left behind.

use crate::common::*;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn cancel_while_waiting_returns_cancelled() {
    let (service, store, lock) = service_with(IoLatency::NONE, patient_options());
    let id = service.create_stock("coupon", 10).unwrap().id();
    let key = service.lock_options().key_for(id);

    let blocker = lock
        .try_acquire(&key, Duration::ZERO, Duration::from_secs(30), &CancellationToken::new())
        .unwrap();
    let Acquisition::Acquired(blocker) = blocker else {
        panic!("blocker should acquire a free key");
    };

    let cancel = CancellationToken::new();
    let started = Instant::now();
    let report = thread::scope(|scope| {
        let waiter = scope.spawn(|| service.issue_safe_with_cancel(id, &cancel));
        thread::sleep(Duration::from_millis(30));
        cancel.cancel();
        waiter.join().unwrap()
    })
    .unwrap();

    assert_eq!(report.outcome, IssueOutcome::Cancelled);
    assert!(!report.success);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(store.find_by_id(id).unwrap().unwrap().consumed(), 0);

    // Only the blocker's lease is live
    assert_eq!(lock.active_leases(), 1);
    assert_eq!(lock.holder_of(&key), Some(blocker.holder()));
    assert_eq!(lock.release(&blocker).unwrap(), ReleaseOutcome::Released);
    assert_eq!(lock.active_leases(), 0);
    assert_eq!(lock.stats().cancellations, 1);
}

#[test]
fn cancel_reaches_every_clone() {
    let (service, _, lock) = service_with(IoLatency::NONE, patient_options());
    let id = service.create_stock("coupon", 10).unwrap().id();
    let key = service.lock_options().key_for(id);
    let held = lock
        .try_acquire(&key, Duration::ZERO, Duration::from_secs(30), &CancellationToken::new())
        .unwrap();
    assert!(held.is_acquired());

    let cancel = CancellationToken::new();
    let outcomes = thread::scope(|scope| {
        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let token = cancel.clone();
                let service = &service;
                scope.spawn(move || service.issue_safe_with_cancel(id, &token))
            })
            .collect();
        thread::sleep(Duration::from_millis(30));
        cancel.cancel();
        waiters
            .into_iter()
            .map(|w| w.join().unwrap().unwrap().outcome)
            .collect::<Vec<_>>()
    });

    assert!(outcomes.iter().all(|o| *o == IssueOutcome::Cancelled));
    assert_eq!(lock.stats().cancellations, 8);
    assert_eq!(lock.active_leases(), 1);
}

#[test]
fn cancellation_after_grant_does_not_abort_section() {
    // Cancellation is only observed while waiting.
    let store = Arc::new(MemoryRecordStore::new());
    let id = store.insert("coupon", 1).unwrap().id();
    let lock = Arc::new(LeaseLockService::new());
    let issuer = SafeIssuer::with_options(Arc::clone(&store), Arc::clone(&lock), patient_options());

    let cancel = CancellationToken::new();
    assert_eq!(
        issuer.issue_with(id, &patient_options(), &cancel).unwrap(),
        IssueOutcome::Issued
    );
    cancel.cancel();
    assert_eq!(store.find_by_id(id).unwrap().unwrap().consumed(), 1);
    assert_eq!(lock.active_leases(), 0);
}
