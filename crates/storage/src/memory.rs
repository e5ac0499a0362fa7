//! MemoryRecordStore: in-process model of the external record store
//!
//! This module implements the RecordStore trait using:
//! - `DashMap<StockId, StockRecord>` for sharded, lock-free reads
//! - `AtomicU64` for store-assigned identifiers
//! - Per-record revisions bumped on every save
//!
//! # Design Notes
//!
//! - **Snapshot reads**: `find_by_id` clones the stored record. Callers never
//!   hold a live reference, so an uncoordinated read-modify-write behaves
//!   exactly like it would against a remote database.
//! - **Write modes**: [`WriteMode::Replace`] (default) is a last-writer-wins
//!   upsert of the whole record, so racing saves lose updates.
//!   [`WriteMode::Increment`] applies the saved copy's pending claims to the
//!   stored count (`SET consumed = consumed + n`), so racing saves all land
//!   and the stored count can pass capacity.
//! - **Stale-write detection**: a save whose revision differs from the stored
//!   revision was computed from a stale read. It is counted and logged, then
//!   applied anyway.
//! - **Injected latency**: optional fixed delays on reads and writes model
//!   network round trips and widen the check-then-act window.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use flashdeal_core::{RecordStore, Result, StockId, StockRecord};

/// Artificial I/O delay applied outside of any store lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoLatency {
    /// Delay before every read
    pub read: Duration,
    /// Delay before every write
    pub write: Duration,
}

impl IoLatency {
    /// No delay
    pub const NONE: IoLatency = IoLatency {
        read: Duration::ZERO,
        write: Duration::ZERO,
    };

    fn pause(delay: Duration) {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

/// How `save` applies a record to an existing row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Overwrite the stored record with the saved copy
    #[default]
    Replace,
    /// Add the saved copy's pending claims to the stored `consumed`
    Increment,
}

/// Thread-safe in-memory record store
#[derive(Debug)]
pub struct MemoryRecordStore {
    records: DashMap<StockId, StockRecord>,
    /// Last assigned identifier
    next_id: AtomicU64,
    /// Saves that overwrote a newer revision than the one they were read at
    stale_writes: AtomicU64,
    latency: IoLatency,
    mode: WriteMode,
}

impl MemoryRecordStore {
    /// Create an empty store without latency
    pub fn new() -> Self {
        Self::with_latency(IoLatency::NONE)
    }

    /// Create an empty store that delays every read and write
    pub fn with_latency(latency: IoLatency) -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicU64::new(0),
            stale_writes: AtomicU64::new(0),
            latency,
            mode: WriteMode::Replace,
        }
    }

    /// Set how saves are applied
    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Configured write mode
    pub fn write_mode(&self) -> WriteMode {
        self.mode
    }

    /// Configured latency
    pub fn latency(&self) -> IoLatency {
        self.latency
    }

    /// Number of saves computed from a stale read
    ///
    /// Zero after any workload where every read-modify-write ran exclusively.
    pub fn stale_writes(&self) -> u64 {
        self.stale_writes.load(Ordering::SeqCst)
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record and reset counters (test teardown)
    ///
    /// Identifiers keep increasing so ids are never reused.
    pub fn clear(&self) {
        self.records.clear();
        self.stale_writes.store(0, Ordering::SeqCst);
    }

    fn allocate_id(&self) -> StockId {
        StockId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryRecordStore {
    fn insert(&self, label: &str, capacity: u32) -> Result<StockRecord> {
        IoLatency::pause(self.latency.write);
        let id = self.allocate_id();
        let record = StockRecord::new(id, label, capacity).with_revision(1);
        self.records.insert(id, record.clone());
        debug!(target: "flashdeal::store", stock_id = %id, capacity, "Stock created");
        Ok(record)
    }

    fn find_by_id(&self, id: StockId) -> Result<Option<StockRecord>> {
        IoLatency::pause(self.latency.read);
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    fn save(&self, record: StockRecord) -> Result<StockRecord> {
        IoLatency::pause(self.latency.write);
        let id = record.id();
        let persisted = match self.records.entry(id) {
            Entry::Occupied(mut entry) => {
                let current = entry.get().revision();
                if record.revision() != current {
                    self.stale_writes.fetch_add(1, Ordering::SeqCst);
                    warn!(
                        target: "flashdeal::store",
                        stock_id = %id,
                        read_revision = record.revision(),
                        stored_revision = current,
                        "Save based on a stale read overwrote a newer revision"
                    );
                }
                let persisted = match self.mode {
                    WriteMode::Replace => record.with_revision(current + 1),
                    WriteMode::Increment => {
                        let consumed = entry
                            .get()
                            .consumed()
                            .saturating_add(record.pending_claims());
                        record.with_consumed(consumed, current + 1)
                    }
                };
                entry.insert(persisted.clone());
                persisted
            }
            Entry::Vacant(entry) => {
                let persisted = record.with_revision(1);
                entry.insert(persisted.clone());
                persisted
            }
        };
        if !persisted.is_consistent() {
            warn!(
                target: "flashdeal::store",
                stock_id = %id,
                capacity = persisted.capacity(),
                consumed = persisted.consumed(),
                "Persisted record violates consumed <= capacity"
            );
        }
        Ok(persisted)
    }
}
