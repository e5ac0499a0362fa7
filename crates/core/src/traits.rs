//! Collaborator traits consumed by the issuers
//!
//! This module defines the RecordStore and DistributedLock traits so the
//! in-memory adapters used in tests can be swapped for a real database and a
//! networked lock service without touching the issuance logic.
//!
//! Thread safety: All methods must be safe to call concurrently from
//! multiple threads (requires Send + Sync).

use std::sync::Arc;
use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::lease::{Acquisition, Lease, ReleaseOutcome};
use crate::stock::StockRecord;
use crate::types::{LockKey, StockId};

/// Durable keyed storage for stock records
///
/// Must provide at least read-your-writes consistency for a single caller's
/// own update.
pub trait RecordStore: Send + Sync {
    /// Create a record with a store-assigned id and nothing consumed
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn insert(&self, label: &str, capacity: u32) -> Result<StockRecord>;

    /// Read the current persisted state of a record
    ///
    /// Returns an owned copy; later saves by other callers are not reflected
    /// in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn find_by_id(&self, id: StockId) -> Result<Option<StockRecord>>;

    /// Upsert a record in one transactional update
    ///
    /// Returns the persisted state, including the revision assigned by the
    /// store.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn save(&self, record: StockRecord) -> Result<StockRecord>;
}

/// Named, leasable mutual exclusion reachable over a network
///
/// Implementations guarantee at most one live lease per key. Leases expire
/// on their own after the granted budget if never released.
pub trait DistributedLock: Send + Sync {
    /// Try to acquire `key`, waiting at most `wait`
    ///
    /// A granted lease expires after `lease`. The wait is abandoned as soon
    /// as `cancel` is observed; a cancelled or timed-out attempt leaves
    /// nothing held.
    ///
    /// # Errors
    ///
    /// Returns an error only for lock-service faults. Timeouts and
    /// cancellation are reported through [`Acquisition`].
    fn try_acquire(
        &self,
        key: &LockKey,
        wait: Duration,
        lease: Duration,
        cancel: &CancellationToken,
    ) -> Result<Acquisition>;

    /// Release a lease
    ///
    /// Safe to call after the lease expired; that case reports
    /// [`ReleaseOutcome::AlreadyExpired`] and never touches a successor's
    /// lease.
    ///
    /// # Errors
    ///
    /// Returns an error only for lock-service faults.
    fn release(&self, lease: &Lease) -> Result<ReleaseOutcome>;
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn insert(&self, label: &str, capacity: u32) -> Result<StockRecord> {
        (**self).insert(label, capacity)
    }

    fn find_by_id(&self, id: StockId) -> Result<Option<StockRecord>> {
        (**self).find_by_id(id)
    }

    fn save(&self, record: StockRecord) -> Result<StockRecord> {
        (**self).save(record)
    }
}

impl<T: DistributedLock + ?Sized> DistributedLock for Arc<T> {
    fn try_acquire(
        &self,
        key: &LockKey,
        wait: Duration,
        lease: Duration,
        cancel: &CancellationToken,
    ) -> Result<Acquisition> {
        (**self).try_acquire(key, wait, lease, cancel)
    }

    fn release(&self, lease: &Lease) -> Result<ReleaseOutcome> {
        (**self).release(lease)
    }
}
