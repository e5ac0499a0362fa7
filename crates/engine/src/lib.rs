//! Issuance engine for flashdeal
//!
//! This crate orchestrates the lower layers:
//! - UnsafeIssuer: uncoordinated read-check-write baseline
//! - SafeIssuer: the same sequence bracketed by a distributed lease
//! - StockService: create, read, issue and stress-test entry points
//! - FlashdealConfig: lock sizing loaded from `flashdeal.toml`
//!
//! The engine is the only component that knows about both the record store
//! and the lock service.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod issuer;
pub mod service;

pub use config::{FlashdealConfig, CONFIG_FILE_NAME};
pub use issuer::{
    AttemptState, IssueOutcome, IssueTally, IssuerStats, SafeIssuer, Strategy, UnsafeIssuer,
};
pub use service::{IssueReport, StockService, StressReport, STRESS_STACK_SIZE};

pub use flashdeal_core::{
    Acquisition, CancellationToken, DistributedLock, Error, HolderId, Lease, LockKey, LockOptions,
    RecordStore, ReleaseOutcome, Result, StockExhausted, StockId, StockRecord,
};
