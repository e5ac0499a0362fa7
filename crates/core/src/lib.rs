//! Core types and traits for flashdeal
//!
//! This crate defines the foundational types used throughout the system:
//! - StockId, LockKey, HolderId: Identifiers
//! - StockRecord: The claimable counter and its invariant
//! - Lease, Acquisition, LockOptions: Lock-service vocabulary
//! - CancellationToken: Cooperative cancellation for lock waiters
//! - Error: Error type hierarchy
//! - Traits: Collaborator contracts (RecordStore, DistributedLock)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod error;
pub mod lease;
pub mod stock;
pub mod traits;
pub mod types;

pub use cancel::CancellationToken;
pub use error::{Error, Result};
pub use lease::{
    Acquisition, Lease, LockOptions, ReleaseOutcome, DEFAULT_ACQUIRE_WAIT, DEFAULT_HOLD_LEASE,
    DEFAULT_LOCK_KEY_PREFIX,
};
pub use stock::{StockExhausted, StockRecord};
pub use traits::{DistributedLock, RecordStore};
pub use types::{HolderId, LockKey, StockId};
