//! Storage layer for flashdeal
//!
//! This crate implements RecordStore adapters:
//! - MemoryRecordStore: DashMap-based store with per-record revisions,
//!   stale-write detection, replace or increment write modes and optional
//!   injected I/O latency
//! - testing::FaultyStore: Scripted save failures for fault-path tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod testing;

pub use memory::{IoLatency, MemoryRecordStore, WriteMode};
