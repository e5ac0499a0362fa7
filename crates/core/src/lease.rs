//! Lease types shared by lock-service adapters and issuers
//!
//! A [`Lease`] is a time-bounded exclusive hold on a [`LockKey`]. It is
//! created by a successful acquisition and ends on explicit release or on
//! expiry, whichever comes first. The lock service, not this crate, enforces
//! that at most one holder exists per key.

use crate::types::{HolderId, LockKey, StockId};
use std::time::{Duration, Instant};

/// Default namespace prefix for stock lock keys
pub const DEFAULT_LOCK_KEY_PREFIX: &str = "stock:lock:";

/// Default bound on how long an issuer waits for a lease (5 seconds)
pub const DEFAULT_ACQUIRE_WAIT: Duration = Duration::from_secs(5);

/// Default lease hold time before automatic expiry (3 seconds)
pub const DEFAULT_HOLD_LEASE: Duration = Duration::from_secs(3);

/// A granted lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    key: LockKey,
    holder: HolderId,
    /// Monotonic per lock service; a successor lease always has a larger fence
    fence: u64,
    budget: Duration,
    acquired_at: Instant,
}

impl Lease {
    /// Create a lease record for a grant
    pub fn new(
        key: LockKey,
        holder: HolderId,
        fence: u64,
        budget: Duration,
        acquired_at: Instant,
    ) -> Self {
        Self {
            key,
            holder,
            fence,
            budget,
            acquired_at,
        }
    }

    /// Leased key
    pub fn key(&self) -> &LockKey {
        &self.key
    }

    /// Holder token
    pub fn holder(&self) -> HolderId {
        self.holder
    }

    /// Fencing token of this grant
    pub fn fence(&self) -> u64 {
        self.fence
    }

    /// Hold budget granted by the lock service
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// When the grant happened (local clock)
    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    /// Time held so far
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Whether the hold budget has been used up
    ///
    /// Best-effort view from the holder's clock. Once true, the lock service
    /// may already have handed the key to another holder.
    pub fn is_past_budget(&self) -> bool {
        self.held_for() >= self.budget
    }
}

/// Result of a bounded-wait acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// Lease granted
    Acquired(Lease),
    /// Wait budget exhausted without a grant
    TimedOut {
        /// Time spent waiting
        waited: Duration,
    },
    /// Caller cancelled while waiting; nothing is held
    Cancelled,
}

impl Acquisition {
    /// Whether a lease was granted
    pub fn is_acquired(&self) -> bool {
        matches!(self, Acquisition::Acquired(_))
    }
}

/// Result of releasing a lease
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The lease was still live and has been removed
    Released,
    /// The lease had already expired or been reclaimed by another holder
    AlreadyExpired,
}

/// Lock sizing used by an issuer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    key_prefix: String,
    acquire_wait: Duration,
    hold_lease: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_LOCK_KEY_PREFIX.to_string(),
            acquire_wait: DEFAULT_ACQUIRE_WAIT,
            hold_lease: DEFAULT_HOLD_LEASE,
        }
    }
}

impl LockOptions {
    /// Create options with explicit values
    pub fn new(key_prefix: impl Into<String>, acquire_wait: Duration, hold_lease: Duration) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            acquire_wait,
            hold_lease,
        }
    }

    /// Set the key namespace prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the acquisition wait budget
    pub fn with_acquire_wait(mut self, wait: Duration) -> Self {
        self.acquire_wait = wait;
        self
    }

    /// Set the lease hold budget
    pub fn with_hold_lease(mut self, lease: Duration) -> Self {
        self.hold_lease = lease;
        self
    }

    /// Key namespace prefix
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Acquisition wait budget
    pub fn acquire_wait(&self) -> Duration {
        self.acquire_wait
    }

    /// Lease hold budget
    pub fn hold_lease(&self) -> Duration {
        self.hold_lease
    }

    /// Lock key for a stock record under these options
    pub fn key_for(&self, id: StockId) -> LockKey {
        LockKey::for_stock(&self.key_prefix, id)
    }
}
