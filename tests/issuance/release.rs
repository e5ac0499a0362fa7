//! Release-Always Tests
//!
//! The lease is released exactly once on every exit path of the critical
//! section: success, business rejection, store fault and panic.

use crate::common::*;
use std::sync::Arc;

fn probed() -> Arc<ProbeLock<LeaseLockService>> {
    init_tracing();
    Arc::new(ProbeLock::new(LeaseLockService::new()))
}

#[test]
fn release_after_success() {
    let lock = probed();
    let store = Arc::new(MemoryRecordStore::new());
    let id = store.insert("coupon", 2).unwrap().id();
    let issuer = SafeIssuer::with_options(store, Arc::clone(&lock), patient_options());

    assert_eq!(issuer.issue(id).unwrap(), IssueOutcome::Issued);
    assert_eq!(lock.releases(), 1);
    assert_eq!(lock.holders(), 0);
    assert_eq!(lock.inner().active_leases(), 0);
}

#[test]
fn release_after_rejection() {
    let lock = probed();
    let store = Arc::new(MemoryRecordStore::new());
    let id = store.insert("coupon", 0).unwrap().id();
    let issuer = SafeIssuer::with_options(store, Arc::clone(&lock), patient_options());

    assert_eq!(issuer.issue(id).unwrap(), IssueOutcome::Exhausted);
    assert_eq!(lock.releases(), 1);
    assert_eq!(lock.inner().active_leases(), 0);
}

#[test]
fn release_after_store_fault() {
    let lock = probed();
    let store = Arc::new(FaultyStore::new(MemoryRecordStore::new()));
    let id = store.insert("coupon", 2).unwrap().id();
    store.fail_next_saves(1);
    let issuer = SafeIssuer::with_options(Arc::clone(&store), Arc::clone(&lock), patient_options());

    assert!(matches!(issuer.issue(id), Err(Error::Storage(_))));
    assert_eq!(lock.releases(), 1);
    assert_eq!(lock.inner().active_leases(), 0);
    assert_eq!(store.injected_failures(), 1);
    assert_eq!(store.find_by_id(id).unwrap().unwrap().consumed(), 0);
}

#[test]
fn release_after_unknown_stock() {
    let lock = probed();
    let issuer = SafeIssuer::with_options(
        Arc::new(MemoryRecordStore::new()),
        Arc::clone(&lock),
        patient_options(),
    );

    assert!(matches!(issuer.issue(StockId::new(404)), Err(Error::NotFound(_))));
    assert_eq!(lock.releases(), 1);
}

/// Store whose save panics
struct PanickingStore(MemoryRecordStore);

impl RecordStore for PanickingStore {
    fn insert(&self, label: &str, capacity: u32) -> Result<flashdeal::StockRecord> {
        self.0.insert(label, capacity)
    }

    fn find_by_id(&self, id: StockId) -> Result<Option<flashdeal::StockRecord>> {
        self.0.find_by_id(id)
    }

    fn save(&self, _record: flashdeal::StockRecord) -> Result<flashdeal::StockRecord> {
        panic!("store driver crashed");
    }
}

#[test]
fn release_after_panic_in_critical_section() {
    let lock = probed();
    let store = Arc::new(PanickingStore(MemoryRecordStore::new()));
    let id = store.insert("coupon", 2).unwrap().id();
    let issuer = SafeIssuer::with_options(store, Arc::clone(&lock), patient_options());

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| issuer.issue(id)));

    assert!(result.is_err());
    assert_eq!(lock.releases(), 1);
    assert_eq!(lock.inner().active_leases(), 0);
}

#[test]
fn concurrent_issues_leave_nothing_held() {
    let lock = probed();
    let store = Arc::new(FaultyStore::new(MemoryRecordStore::new()));
    let id = store.insert("coupon", 10).unwrap().id();
    store.fail_next_saves(3);
    let issuer = SafeIssuer::with_options(Arc::clone(&store), Arc::clone(&lock), patient_options());

    let results = run_concurrently(24, |_| issuer.issue(id));
    let errors = results.iter().filter(|r| r.is_err()).count();

    assert_eq!(errors, 3);
    assert_eq!(lock.releases(), 24);
    assert_eq!(lock.holders(), 0);
    assert_eq!(lock.inner().active_leases(), 0);
    assert_eq!(store.find_by_id(id).unwrap().unwrap().consumed(), 10);
}
