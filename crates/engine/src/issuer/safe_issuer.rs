//! Lease-coordinated issuer
//!
//! ## Attempt lifecycle
//!
//! ```text
//! Idle ──▶ Acquiring ──granted──▶ Held ──▶ Releasing ──▶ Done
//!              │
//!              ├──wait spent──▶ TimedOut
//!              └──cancelled───▶ Cancelled
//! ```
//!
//! `Held` always moves to `Releasing`: the lease sits in a [`LeaseGuard`]
//! from the moment it is granted, so a store fault, a `?`, or a panic inside
//! the critical section still releases it exactly once.
//!
//! Exclusion is only as strong as the lock service and the lease sizing. If
//! the critical section outlives `hold_lease`, the lease expires, a second
//! caller can enter, and the late release is reported as
//! [`ReleaseOutcome::AlreadyExpired`].

use std::sync::Arc;

use tracing::{debug, trace, warn};

use flashdeal_concurrency::LeaseGuard;
use flashdeal_core::{
    Acquisition, CancellationToken, DistributedLock, LockOptions, RecordStore, ReleaseOutcome,
    Result, StockId,
};

use super::{claim_and_persist, section_outcome, IssueCounters, IssueOutcome, IssuerStats};

/// Where an attempt is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Not started
    Idle,
    /// Waiting on the lock service
    Acquiring,
    /// Lease granted; critical section running
    Held,
    /// Critical section finished; lease being released
    Releasing,
    /// Lease released
    Done,
    /// Wait budget spent without a grant
    TimedOut,
    /// Cancelled while waiting
    Cancelled,
}

impl AttemptState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Idle, Acquiring)
                | (Acquiring, Held)
                | (Acquiring, TimedOut)
                | (Acquiring, Cancelled)
                | (Held, Releasing)
                | (Releasing, Done)
        )
    }

    /// Whether the attempt has ended
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptState::Done | AttemptState::TimedOut | AttemptState::Cancelled
        )
    }

    fn advance(&mut self, next: AttemptState, id: StockId) {
        debug_assert!(
            self.can_transition_to(next),
            "illegal attempt transition {:?} -> {:?}",
            self,
            next
        );
        trace!(target: "flashdeal::issue", stock = %id, from = ?*self, to = ?next, "Attempt transition");
        *self = next;
    }
}

/// Issuer that serializes claims through a distributed lock
///
/// The store and the lock are injected; the issuer holds no in-process
/// mutex of its own.
pub struct SafeIssuer<S: RecordStore, L: DistributedLock> {
    store: Arc<S>,
    lock: Arc<L>,
    options: LockOptions,
    counters: IssueCounters,
}

impl<S: RecordStore, L: DistributedLock> SafeIssuer<S, L> {
    /// Create an issuer with default lock sizing
    pub fn new(store: Arc<S>, lock: Arc<L>) -> Self {
        Self::with_options(store, lock, LockOptions::default())
    }

    /// Create an issuer with explicit lock sizing
    pub fn with_options(store: Arc<S>, lock: Arc<L>, options: LockOptions) -> Self {
        Self {
            store,
            lock,
            options,
            counters: IssueCounters::default(),
        }
    }

    /// Lock sizing used by [`issue`](Self::issue)
    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Issue one unit under the configured lock sizing
    pub fn issue(&self, id: StockId) -> Result<IssueOutcome> {
        self.issue_with(id, &self.options, &CancellationToken::new())
    }

    /// Issue one unit under explicit lock sizing and cancellation
    ///
    /// # Errors
    ///
    /// `NotFound`, store faults and lock-service faults propagate. A fault in
    /// the critical section takes precedence over a fault releasing the lease.
    pub fn issue_with(
        &self,
        id: StockId,
        options: &LockOptions,
        cancel: &CancellationToken,
    ) -> Result<IssueOutcome> {
        let result = self.run_attempt(id, options, cancel);
        self.counters.record(&result);
        result
    }

    /// Outcome counters since construction
    pub fn stats(&self) -> IssuerStats {
        self.counters.snapshot()
    }

    fn run_attempt(
        &self,
        id: StockId,
        options: &LockOptions,
        cancel: &CancellationToken,
    ) -> Result<IssueOutcome> {
        let key = options.key_for(id);
        let mut state = AttemptState::Idle;
        state.advance(AttemptState::Acquiring, id);

        let acquisition = self.lock.try_acquire(
            &key,
            options.acquire_wait(),
            options.hold_lease(),
            cancel,
        )?;

        let lease = match acquisition {
            Acquisition::Acquired(lease) => lease,
            Acquisition::TimedOut { waited } => {
                state.advance(AttemptState::TimedOut, id);
                warn!(
                    target: "flashdeal::issue",
                    stock = %id,
                    key = %key,
                    waited_ms = waited.as_millis() as u64,
                    "Lock acquisition timed out"
                );
                return Ok(IssueOutcome::LockTimeout);
            }
            Acquisition::Cancelled => {
                state.advance(AttemptState::Cancelled, id);
                debug!(target: "flashdeal::issue", stock = %id, "Issue cancelled while waiting");
                return Ok(IssueOutcome::Cancelled);
            }
        };

        state.advance(AttemptState::Held, id);
        let guard = LeaseGuard::new(self.lock.as_ref(), lease);
        let section = section_outcome(claim_and_persist(self.store.as_ref(), id));

        state.advance(AttemptState::Releasing, id);
        let released = guard.release();
        state.advance(AttemptState::Done, id);

        let outcome = section?;
        if released? == ReleaseOutcome::AlreadyExpired {
            warn!(
                target: "flashdeal::issue",
                stock = %id,
                ?outcome,
                "Critical section outlived its lease; exclusion not guaranteed"
            );
        }
        Ok(outcome)
    }
}
