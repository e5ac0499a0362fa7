//! Issuance strategies
//!
//! Both strategies run the same read, check, claim, persist sequence
//! ([`claim_and_persist`]). [`UnsafeIssuer`] runs it bare; [`SafeIssuer`]
//! brackets it with a lease on the stock's lock key.
//!
//! Business rejection and lock contention are [`IssueOutcome`] values.
//! Only infrastructure faults and unknown ids are errors.

mod safe_issuer;
mod unsafe_issuer;

pub use safe_issuer::{AttemptState, SafeIssuer};
pub use unsafe_issuer::UnsafeIssuer;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use flashdeal_core::{Error, RecordStore, Result, StockId, StockRecord};

/// How a single issuance attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueOutcome {
    /// One unit claimed and persisted
    Issued,
    /// No capacity remained
    Exhausted,
    /// The lock wait budget ran out before acquisition
    LockTimeout,
    /// The caller cancelled while waiting for the lock
    Cancelled,
}

impl IssueOutcome {
    /// Whether a unit was issued
    pub fn is_success(self) -> bool {
        matches!(self, IssueOutcome::Issued)
    }

    /// Stable lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            IssueOutcome::Issued => "issued",
            IssueOutcome::Exhausted => "exhausted",
            IssueOutcome::LockTimeout => "lock_timeout",
            IssueOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for IssueOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which issuer serves a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Uncoordinated read-check-write (over-issues under contention)
    Unsafe,
    /// Lease-coordinated read-check-write
    Safe,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Unsafe => f.write_str("unsafe"),
            Strategy::Safe => f.write_str("safe"),
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    /// Accepts `unsafe`/`v1` and `safe`/`v2`, case-insensitively
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unsafe" | "v1" => Ok(Strategy::Unsafe),
            "safe" | "v2" => Ok(Strategy::Safe),
            other => Err(Error::invalid_input(format!(
                "unknown issuance strategy '{}', expected \"unsafe\" or \"safe\"",
                other
            ))),
        }
    }
}

/// Count of attempts per outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTally {
    /// Attempts that issued a unit
    pub issued: u64,
    /// Attempts rejected for lack of capacity
    pub exhausted: u64,
    /// Attempts that never acquired the lock
    pub lock_timeouts: u64,
    /// Attempts cancelled while waiting
    pub cancelled: u64,
}

impl IssueTally {
    /// Count one outcome
    pub fn record(&mut self, outcome: IssueOutcome) {
        match outcome {
            IssueOutcome::Issued => self.issued += 1,
            IssueOutcome::Exhausted => self.exhausted += 1,
            IssueOutcome::LockTimeout => self.lock_timeouts += 1,
            IssueOutcome::Cancelled => self.cancelled += 1,
        }
    }

    /// Number of attempts counted
    pub fn total(&self) -> u64 {
        self.issued + self.exhausted + self.lock_timeouts + self.cancelled
    }
}

/// Snapshot of an issuer's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssuerStats {
    /// Attempts that returned an outcome
    pub outcomes: IssueTally,
    /// Attempts that returned an error
    pub errors: u64,
}

/// Per-issuer outcome counters
///
/// Relaxed ordering; observational only.
#[derive(Debug, Default)]
pub(crate) struct IssueCounters {
    issued: AtomicU64,
    exhausted: AtomicU64,
    lock_timeouts: AtomicU64,
    cancelled: AtomicU64,
    errors: AtomicU64,
}

impl IssueCounters {
    pub(crate) fn record(&self, result: &Result<IssueOutcome>) {
        let counter = match result {
            Ok(IssueOutcome::Issued) => &self.issued,
            Ok(IssueOutcome::Exhausted) => &self.exhausted,
            Ok(IssueOutcome::LockTimeout) => &self.lock_timeouts,
            Ok(IssueOutcome::Cancelled) => &self.cancelled,
            Err(_) => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> IssuerStats {
        IssuerStats {
            outcomes: IssueTally {
                issued: self.issued.load(Ordering::Relaxed),
                exhausted: self.exhausted.load(Ordering::Relaxed),
                lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
                cancelled: self.cancelled.load(Ordering::Relaxed),
            },
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Read the record, claim one unit, persist it
///
/// Persists only when the claim succeeds. Fails with `NotFound` for an
/// unknown id and `Exhausted` when no capacity remains.
pub(crate) fn claim_and_persist<S>(store: &S, id: StockId) -> Result<StockRecord>
where
    S: RecordStore + ?Sized,
{
    let mut record = store.find_by_id(id)?.ok_or(Error::NotFound(id))?;
    record.claim()?;
    let saved = store.save(record)?;
    debug!(
        target: "flashdeal::issue",
        stock = %id,
        consumed = saved.consumed(),
        remaining = saved.remaining(),
        "Unit claimed"
    );
    Ok(saved)
}

/// Fold a critical-section result into an outcome
pub(crate) fn section_outcome(result: Result<StockRecord>) -> Result<IssueOutcome> {
    match result {
        Ok(_) => Ok(IssueOutcome::Issued),
        Err(Error::Exhausted(rejected)) => {
            warn!(
                target: "flashdeal::issue",
                stock = %rejected.id,
                capacity = rejected.capacity,
                consumed = rejected.consumed,
                "Stock exhausted"
            );
            Ok(IssueOutcome::Exhausted)
        }
        Err(e) => Err(e),
    }
}
