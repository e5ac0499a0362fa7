//! StockService: the inbound surface
//!
//! Wires one store and one lock service into both issuers and exposes the
//! request-layer operations. Every issue call re-reads the record afterwards
//! to fill its [`IssueReport`], so under concurrency the reported counts are
//! a snapshot taken after the attempt, not the state the attempt itself saw.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{error, info};

use flashdeal_core::{
    CancellationToken, DistributedLock, Error, LockOptions, RecordStore, Result, StockId,
    StockRecord,
};

use crate::config::FlashdealConfig;
use crate::issuer::{IssueOutcome, IssueTally, IssuerStats, SafeIssuer, Strategy, UnsafeIssuer};

/// Stack size for stress-test caller threads (256 KiB)
pub const STRESS_STACK_SIZE: usize = 256 * 1024;

/// Result of one issue request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueReport {
    /// Issuer that served the request
    pub strategy: Strategy,
    /// How the attempt ended
    pub outcome: IssueOutcome,
    /// Whether a unit was issued
    pub success: bool,
    /// Consumed count read after the attempt
    pub issued_count: u32,
    /// Remaining capacity read after the attempt
    pub remaining: i64,
}

/// Result of a concurrent stress run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StressReport {
    /// Issuer under test
    pub strategy: Strategy,
    /// Concurrent callers launched
    pub callers: usize,
    /// Outcomes returned by the callers
    pub outcomes: IssueTally,
    /// Callers that returned an error or panicked
    pub errors: u64,
    /// First error observed, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
    /// Record capacity
    pub capacity: u32,
    /// Capacity still available when the run started
    pub available_before: u32,
    /// Consumed count after the run
    pub issued_count: u32,
    /// Remaining capacity after the run
    pub remaining: i64,
    /// Successful issues beyond the capacity available at start
    pub over_issued: u64,
    /// Successful issues whose write was overwritten by another caller
    pub lost_updates: u64,
    /// Wall-clock duration of the run in milliseconds
    pub elapsed_ms: u64,
}

impl StressReport {
    /// Whether the run issued no more than the available capacity and every
    /// success is reflected in the record
    pub fn is_consistent(&self) -> bool {
        self.over_issued == 0 && self.lost_updates == 0
    }
}

/// Issue requests against one store and one lock service
pub struct StockService<S: RecordStore, L: DistributedLock> {
    store: Arc<S>,
    unsafe_issuer: UnsafeIssuer<S>,
    safe_issuer: SafeIssuer<S, L>,
}

impl<S: RecordStore, L: DistributedLock> StockService<S, L> {
    /// Create a service with explicit lock sizing
    pub fn new(store: Arc<S>, lock: Arc<L>, options: LockOptions) -> Self {
        Self {
            unsafe_issuer: UnsafeIssuer::new(Arc::clone(&store)),
            safe_issuer: SafeIssuer::with_options(Arc::clone(&store), lock, options),
            store,
        }
    }

    /// Create a service sized from a validated config
    pub fn from_config(store: Arc<S>, lock: Arc<L>, config: &FlashdealConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(store, lock, config.lock_options()))
    }

    /// The backing store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Lock sizing used by safe issues
    pub fn lock_options(&self) -> &LockOptions {
        self.safe_issuer.options()
    }

    /// Create a stock record with nothing consumed
    pub fn create_stock(&self, label: &str, capacity: u32) -> Result<StockRecord> {
        let record = self.store.insert(label, capacity)?;
        info!(
            target: "flashdeal::issue",
            stock = %record.id(),
            label,
            capacity,
            "Stock created"
        );
        Ok(record)
    }

    /// Read a stock record
    ///
    /// # Errors
    ///
    /// `NotFound` when no record has this id.
    pub fn get_stock(&self, id: StockId) -> Result<StockRecord> {
        self.store.find_by_id(id)?.ok_or(Error::NotFound(id))
    }

    /// Issue through the uncoordinated baseline
    pub fn issue_unsafe(&self, id: StockId) -> Result<IssueReport> {
        let outcome = self.unsafe_issuer.attempt(id)?;
        self.report(id, Strategy::Unsafe, outcome)
    }

    /// Issue under the distributed lock
    pub fn issue_safe(&self, id: StockId) -> Result<IssueReport> {
        let outcome = self.safe_issuer.issue(id)?;
        self.report(id, Strategy::Safe, outcome)
    }

    /// Issue under the distributed lock, abandoning the wait on cancellation
    pub fn issue_safe_with_cancel(
        &self,
        id: StockId,
        cancel: &CancellationToken,
    ) -> Result<IssueReport> {
        let outcome = self
            .safe_issuer
            .issue_with(id, self.safe_issuer.options(), cancel)?;
        self.report(id, Strategy::Safe, outcome)
    }

    /// Issue with either strategy
    pub fn issue(&self, id: StockId, strategy: Strategy) -> Result<IssueReport> {
        match strategy {
            Strategy::Unsafe => self.issue_unsafe(id),
            Strategy::Safe => self.issue_safe(id),
        }
    }

    /// Counters for the given issuer
    pub fn issuer_stats(&self, strategy: Strategy) -> IssuerStats {
        match strategy {
            Strategy::Unsafe => self.unsafe_issuer.stats(),
            Strategy::Safe => self.safe_issuer.stats(),
        }
    }

    fn attempt(&self, id: StockId, strategy: Strategy) -> Result<IssueOutcome> {
        match strategy {
            Strategy::Unsafe => self.unsafe_issuer.attempt(id),
            Strategy::Safe => self.safe_issuer.issue(id),
        }
    }

    fn report(&self, id: StockId, strategy: Strategy, outcome: IssueOutcome) -> Result<IssueReport> {
        let record = self.get_stock(id)?;
        Ok(IssueReport {
            strategy,
            outcome,
            success: outcome.is_success(),
            issued_count: record.consumed(),
            remaining: record.remaining(),
        })
    }

    /// Launch `callers` concurrent issues against one record
    ///
    /// All callers are spawned first and released together, then joined.
    /// Errors from individual callers are counted, not propagated.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for zero callers, `NotFound` for an unknown id, and
    /// `Io` if the caller threads cannot be spawned.
    pub fn stress_test(&self, id: StockId, strategy: Strategy, callers: usize) -> Result<StressReport> {
        if callers == 0 {
            return Err(Error::invalid_input("stress test needs at least one caller"));
        }
        let before = self.get_stock(id)?;
        info!(
            target: "flashdeal::issue",
            stock = %id,
            %strategy,
            callers,
            capacity = before.capacity(),
            "Stress test starting"
        );

        let gate = StartGate::new();
        let started = Instant::now();
        let results: std::result::Result<Vec<thread::Result<Result<IssueOutcome>>>, std::io::Error> =
            thread::scope(|scope| {
                let mut handles = Vec::with_capacity(callers);
                for n in 0..callers {
                    let spawned = thread::Builder::new()
                        .name(format!("flashdeal-caller-{}", n))
                        .stack_size(STRESS_STACK_SIZE)
                        .spawn_scoped(scope, || {
                            if gate.wait() {
                                Some(self.attempt(id, strategy))
                            } else {
                                None
                            }
                        });
                    match spawned {
                        Ok(handle) => handles.push(handle),
                        Err(e) => {
                            gate.abort();
                            return Err(e);
                        }
                    }
                }
                gate.open();
                Ok(handles
                    .into_iter()
                    .filter_map(|handle| match handle.join() {
                        Ok(Some(result)) => Some(Ok(result)),
                        Ok(None) => None,
                        Err(panic) => Some(Err(panic)),
                    })
                    .collect())
            });
        let results = results?;
        let elapsed = started.elapsed();

        let mut outcomes = IssueTally::default();
        let mut errors = 0u64;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(Ok(outcome)) => outcomes.record(outcome),
                Ok(Err(e)) => {
                    errors += 1;
                    first_error.get_or_insert_with(|| e.to_string());
                }
                Err(_) => {
                    errors += 1;
                    first_error.get_or_insert_with(|| "issuer thread panicked".to_string());
                }
            }
        }
        if let Some(message) = &first_error {
            error!(target: "flashdeal::issue", stock = %id, errors, first_error = %message, "Stress test callers failed");
        }

        let after = self.get_stock(id)?;
        let available_before = before.capacity().saturating_sub(before.consumed());
        let persisted = u64::from(after.consumed().saturating_sub(before.consumed()));
        let report = StressReport {
            strategy,
            callers,
            outcomes,
            errors,
            first_error,
            capacity: after.capacity(),
            available_before,
            issued_count: after.consumed(),
            remaining: after.remaining(),
            over_issued: outcomes.issued.saturating_sub(u64::from(available_before)),
            lost_updates: outcomes.issued.saturating_sub(persisted),
            elapsed_ms: elapsed.as_millis() as u64,
        };
        info!(
            target: "flashdeal::issue",
            stock = %id,
            %strategy,
            issued = report.outcomes.issued,
            exhausted = report.outcomes.exhausted,
            lock_timeouts = report.outcomes.lock_timeouts,
            errors = report.errors,
            over_issued = report.over_issued,
            lost_updates = report.lost_updates,
            elapsed_ms = report.elapsed_ms,
            "Stress test finished"
        );
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Closed,
    Open,
    Aborted,
}

/// One-shot start signal for stress-test callers
///
/// Unlike a `Barrier` sized up front, an aborted gate releases callers that
/// were already spawned when a later spawn fails.
struct StartGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl StartGate {
    fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Closed),
            changed: Condvar::new(),
        }
    }

    /// Block until the gate opens (`true`) or aborts (`false`)
    fn wait(&self) -> bool {
        let mut state = self.state.lock();
        while *state == GateState::Closed {
            self.changed.wait(&mut state);
        }
        *state == GateState::Open
    }

    fn open(&self) {
        self.set(GateState::Open);
    }

    fn abort(&self) {
        self.set(GateState::Aborted);
    }

    fn set(&self, next: GateState) {
        *self.state.lock() = next;
        self.changed.notify_all();
    }
}
