//! Flashdeal - flash-sale stock issuance with lease-based distributed locking
//!
//! A finite stock is claimed one unit at a time by many concurrent callers.
//! Two issuers share the same read, check, claim, persist sequence:
//! the unsafe baseline runs it bare and over-issues under contention, the
//! safe issuer runs it under a lease on the stock's lock key.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use flashdeal::{LeaseLockService, LockOptions, MemoryRecordStore, StockService};
//!
//! let service = StockService::new(
//!     Arc::new(MemoryRecordStore::new()),
//!     Arc::new(LeaseLockService::new()),
//!     LockOptions::default(),
//! );
//! let stock = service.create_stock("spring sale", 100)?;
//!
//! let report = service.issue_safe(stock.id())?;
//! assert!(report.success);
//! assert_eq!(report.remaining, 99);
//! # Ok::<(), flashdeal::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `flashdeal-core`: records, lease vocabulary, the `RecordStore` and
//!   `DistributedLock` seams
//! - `flashdeal-storage`: in-memory record store and fault injection
//! - `flashdeal-concurrency`: lease lock services and scoped release
//! - `flashdeal-engine`: issuers, configuration and `StockService`

pub use flashdeal_concurrency::{Backoff, LeaseGuard, LeaseLockService, LockStats};
#[cfg(feature = "redis")]
pub use flashdeal_concurrency::RedisLock;
pub use flashdeal_engine::*;
pub use flashdeal_storage::testing::FaultyStore;
pub use flashdeal_storage::{IoLatency, MemoryRecordStore, WriteMode};
