//! Identifier types for flashdeal
//!
//! This module defines the foundational identifiers:
//! - StockId: Store-assigned identifier of a stock record
//! - LockKey: Lock-service key derived from a namespace prefix and a StockId
//! - HolderId: Opaque token identifying the execution context holding a lease

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a stock record
///
/// Assigned by the record store when the record is created and never
/// changed afterwards. Identifiers are plain sequence numbers so the lock
/// key derived from them is stable across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockId(u64);

impl StockId {
    /// Wrap a raw identifier
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw identifier
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for StockId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for StockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key under which the lock service tracks a lease
///
/// Format: `<prefix><stock id>`, e.g. `stock:lock:42`. For a fixed prefix
/// the mapping from StockId to LockKey is injective, so two resources never
/// contend on the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockKey(String);

impl LockKey {
    /// Derive the lock key for a stock record
    pub fn for_stock(prefix: &str, id: StockId) -> Self {
        Self(format!("{}{}", prefix, id))
    }

    /// Use a raw key verbatim
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque token identifying a lease holder
///
/// A fresh HolderId (UUID v4) is minted for every acquisition attempt, so a
/// holder token is never shared between two execution contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderId(Uuid);

impl HolderId {
    /// Create a new random HolderId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for HolderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
