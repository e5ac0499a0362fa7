//! Uncoordinated issuer
//!
//! Reads the record, checks capacity and writes it back with nothing
//! serializing concurrent callers. Two callers that read the same snapshot
//! both see capacity, both claim, and the store keeps whichever save lands
//! last. Kept as the baseline that demonstrates over-issuance.

use std::sync::Arc;

use tracing::trace;

use flashdeal_core::{RecordStore, Result, StockId};

use super::{claim_and_persist, section_outcome, IssueCounters, IssueOutcome, IssuerStats};

/// Check-then-act issuer with no exclusion
pub struct UnsafeIssuer<S: RecordStore> {
    store: Arc<S>,
    counters: IssueCounters,
}

impl<S: RecordStore> UnsafeIssuer<S> {
    /// Create an issuer over `store`
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            counters: IssueCounters::default(),
        }
    }

    /// Try to issue one unit; `Ok(true)` when issued
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id; store faults propagate unchanged.
    pub fn issue(&self, id: StockId) -> Result<bool> {
        self.attempt(id).map(IssueOutcome::is_success)
    }

    /// Try to issue one unit and report how the attempt ended
    pub fn attempt(&self, id: StockId) -> Result<IssueOutcome> {
        trace!(target: "flashdeal::issue", stock = %id, "Unsafe issue");
        let result = section_outcome(claim_and_persist(self.store.as_ref(), id));
        self.counters.record(&result);
        result
    }

    /// Outcome counters since construction
    pub fn stats(&self) -> IssuerStats {
        self.counters.snapshot()
    }
}
