//! Error types for flashdeal
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Business rejection ([`StockExhausted`]) travels as an error only inside the
//! critical section; issuers translate it into an unsuccessful outcome before
//! it reaches the caller. Lock timeouts and cancellation are outcomes, never
//! errors.

use crate::stock::StockExhausted;
use crate::types::StockId;
use std::io;
use thiserror::Error;

/// Result type alias for flashdeal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for flashdeal
#[derive(Debug, Error)]
pub enum Error {
    /// No record exists for the identifier
    #[error("Stock not found: {0}")]
    NotFound(StockId),

    /// Claim rejected because the record has no remaining capacity
    #[error(transparent)]
    Exhausted(#[from] StockExhausted),

    /// Record store fault (connectivity, transport, injected failure)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Lock service fault (connectivity, transport, protocol)
    #[error("Lock service error: {0}")]
    LockService(String),

    /// Invalid argument or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error (config files, thread spawning)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build an `InvalidInput` error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Build a `Storage` error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Build a `LockService` error
    pub fn lock_service(msg: impl Into<String>) -> Self {
        Error::LockService(msg.into())
    }

    /// Whether this error originates from an external collaborator
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::LockService(_) | Error::Io(_))
    }
}
