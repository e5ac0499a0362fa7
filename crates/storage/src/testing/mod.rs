//! Testing utilities for record store fault handling
//!
//! - **FaultyStore**: Wraps a RecordStore and fails a scripted number of saves
//!
//! # Example
//!
//! ```ignore
//! use flashdeal_storage::testing::FaultyStore;
//!
//! let store = FaultyStore::new(MemoryRecordStore::new());
//! store.fail_next_saves(1);
//! // The next save returns Error::Storage; the one after succeeds
//! ```

mod fault;

pub use fault::FaultyStore;
