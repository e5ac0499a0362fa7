//! Lock services for flashdeal
//!
//! This crate implements the DistributedLock seam:
//! - LeaseLockService: in-process lease table with fencing, expiry and
//!   cancellable bounded waits
//! - LeaseGuard: exactly-once release of a held lease
//! - RedisLock (feature `redis`): SET NX PX leases on a Redis server
//! - Backoff: jittered polling delays for network lock services

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod guard;
pub mod lease_service;
#[cfg(feature = "redis")]
pub mod redis_lock;

pub use backoff::Backoff;
pub use guard::LeaseGuard;
pub use lease_service::{LeaseLockService, LockStats, WAIT_SLICE};
#[cfg(feature = "redis")]
pub use redis_lock::RedisLock;
