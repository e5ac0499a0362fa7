//! Scripted save failures

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use flashdeal_core::{Error, RecordStore, Result, StockId, StockRecord};

/// RecordStore wrapper that fails a scripted number of saves
///
/// Reads and inserts pass through. A failed save never reaches the inner
/// store, so the persisted record is unchanged.
#[derive(Debug)]
pub struct FaultyStore<S> {
    inner: S,
    failing_saves: AtomicU32,
    injected: AtomicU64,
}

impl<S: RecordStore> FaultyStore<S> {
    /// Wrap a store with no failures scheduled
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_saves: AtomicU32::new(0),
            injected: AtomicU64::new(0),
        }
    }

    /// Fail the next `n` saves with `Error::Storage`
    pub fn fail_next_saves(&self, n: u32) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    /// Number of failures injected so far
    pub fn injected_failures(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn take_failure(&self) -> bool {
        self.failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl<S: RecordStore> RecordStore for FaultyStore<S> {
    fn insert(&self, label: &str, capacity: u32) -> Result<StockRecord> {
        self.inner.insert(label, capacity)
    }

    fn find_by_id(&self, id: StockId) -> Result<Option<StockRecord>> {
        self.inner.find_by_id(id)
    }

    fn save(&self, record: StockRecord) -> Result<StockRecord> {
        if self.take_failure() {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(Error::storage(format!(
                "injected save failure for stock {}",
                record.id()
            )));
        }
        self.inner.save(record)
    }
}
