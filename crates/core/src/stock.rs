//! StockRecord: the claimable counter
//!
//! ## Invariant
//!
//! `0 <= consumed <= capacity` after every committed transition. The record
//! itself performs no locking; [`StockRecord::claim`] must run under whatever
//! exclusion the calling strategy provides.
//!
//! ## Lifecycle
//!
//! ```text
//! insert (consumed = 0) ──claim()──▶ consumed + 1 ──claim()──▶ ... ──▶ consumed == capacity
//!                                                                        │
//!                                                          claim() → StockExhausted
//! ```

use crate::types::StockId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claim rejected because no capacity remains
///
/// A business outcome, not a fault. Carries the state observed at rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Stock {id} exhausted: capacity={capacity}, consumed={consumed}")]
pub struct StockExhausted {
    /// Record that rejected the claim
    pub id: StockId,
    /// Capacity at rejection
    pub capacity: u32,
    /// Consumed count at rejection
    pub consumed: u32,
}

/// A finite pool of claimable units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    id: StockId,
    label: String,
    capacity: u32,
    consumed: u32,
    /// Store-assigned revision, bumped on every save
    revision: u64,
    /// Claims made on this copy since it was read
    #[serde(skip)]
    pending_claims: u32,
}

impl StockRecord {
    /// Create a fresh record with nothing consumed
    pub fn new(id: StockId, label: impl Into<String>, capacity: u32) -> Self {
        Self {
            id,
            label: label.into(),
            capacity,
            consumed: 0,
            revision: 0,
            pending_claims: 0,
        }
    }

    /// Rebuild a record from persisted fields
    ///
    /// Used by store adapters when hydrating a row. Does not validate the
    /// invariant: a store may legitimately hold an oversold record written by
    /// an uncoordinated issuer.
    pub fn restore(
        id: StockId,
        label: impl Into<String>,
        capacity: u32,
        consumed: u32,
        revision: u64,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            capacity,
            consumed,
            revision,
            pending_claims: 0,
        }
    }

    /// Record identifier
    pub fn id(&self) -> StockId {
        self.id
    }

    /// Descriptive label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Total claimable units
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Units claimed so far
    pub fn consumed(&self) -> u32 {
        self.consumed
    }

    /// Store revision this copy was read at
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Claims made on this copy since it was read
    ///
    /// Stores that apply a save as a delta use this instead of `consumed`.
    pub fn pending_claims(&self) -> u32 {
        self.pending_claims
    }

    /// Return a copy stamped with a new store revision
    ///
    /// The copy counts as freshly persisted, so its pending claims reset.
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self.pending_claims = 0;
        self
    }

    /// Return a persisted copy with `consumed` set by the store
    pub fn with_consumed(mut self, consumed: u32, revision: u64) -> Self {
        self.consumed = consumed;
        self.with_revision(revision)
    }

    /// Whether at least one unit remains
    #[inline]
    pub fn can_claim(&self) -> bool {
        self.consumed < self.capacity
    }

    /// Claim one unit
    ///
    /// # Errors
    ///
    /// Returns [`StockExhausted`] without mutating anything if
    /// [`can_claim`](Self::can_claim) is false.
    pub fn claim(&mut self) -> Result<(), StockExhausted> {
        if !self.can_claim() {
            return Err(StockExhausted {
                id: self.id,
                capacity: self.capacity,
                consumed: self.consumed,
            });
        }
        self.consumed += 1;
        self.pending_claims += 1;
        Ok(())
    }

    /// `capacity - consumed`
    ///
    /// Signed so an oversold record reports a negative remainder.
    #[inline]
    pub fn remaining(&self) -> i64 {
        i64::from(self.capacity) - i64::from(self.consumed)
    }

    /// Whether `consumed <= capacity` holds
    pub fn is_consistent(&self) -> bool {
        self.consumed <= self.capacity
    }
}
