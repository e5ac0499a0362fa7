//! LeaseLockService: in-process model of the external lease coordinator
//!
//! Grants at most one live lease per key. Leases carry an absolute expiry;
//! an expired lease stays in the table until the next acquisition attempt on
//! its key reclaims it.
//!
//! ## Acquisition
//!
//! ```text
//! lock table ─▶ cancelled? ──yes──▶ Cancelled
//!                  │ no
//!                  ▼
//!            key vacant or expired? ──yes──▶ grant (new fence) ──▶ Acquired
//!                  │ no
//!                  ▼
//!            wait budget spent? ──yes──▶ TimedOut
//!                  │ no
//!                  ▼
//!            condvar wait (≤ WAIT_SLICE, ≤ holder expiry, ≤ deadline) ──▶ loop
//! ```
//!
//! Waiters wake on every release and at least every [`WAIT_SLICE`], so a
//! cancellation or a lease expiry is observed without a timer thread. Which
//! waiter wins after a release is unspecified.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use flashdeal_core::{
    Acquisition, CancellationToken, DistributedLock, Error, HolderId, Lease, LockKey,
    ReleaseOutcome, Result,
};

/// Longest a waiter sleeps before re-checking cancellation and expiry
pub const WAIT_SLICE: Duration = Duration::from_millis(5);

/// Upper bound used when a deadline would overflow `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

#[derive(Debug, Clone)]
struct LeaseEntry {
    holder: HolderId,
    fence: u64,
    expires_at: Instant,
}

impl LeaseEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Lock service counters
///
/// Uses Relaxed ordering; these are observational only.
#[derive(Debug, Default)]
struct LockCounters {
    grants: AtomicU64,
    timeouts: AtomicU64,
    cancellations: AtomicU64,
    reclaims: AtomicU64,
    releases: AtomicU64,
    stale_releases: AtomicU64,
}

/// Snapshot of lock service activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStats {
    /// Leases granted
    pub grants: u64,
    /// Acquisitions that exhausted their wait budget
    pub timeouts: u64,
    /// Acquisitions abandoned through cancellation
    pub cancellations: u64,
    /// Expired leases taken over by a new holder
    pub reclaims: u64,
    /// Releases that removed a live lease
    pub releases: u64,
    /// Releases that found their lease expired or reclaimed
    pub stale_releases: u64,
}

/// In-process lease lock service
#[derive(Debug, Default)]
pub struct LeaseLockService {
    leases: Mutex<HashMap<LockKey, LeaseEntry>>,
    released: Condvar,
    next_fence: AtomicU64,
    counters: LockCounters,
}

impl LeaseLockService {
    /// Create a service with no leases
    pub fn new() -> Self {
        Self::default()
    }

    /// Current live holder of a key, if any
    pub fn holder_of(&self, key: &LockKey) -> Option<HolderId> {
        let now = Instant::now();
        self.leases
            .lock()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.holder)
    }

    /// Number of live (unexpired) leases
    pub fn active_leases(&self) -> usize {
        let now = Instant::now();
        self.leases
            .lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Activity counters
    pub fn stats(&self) -> LockStats {
        LockStats {
            grants: self.counters.grants.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            cancellations: self.counters.cancellations.load(Ordering::Relaxed),
            reclaims: self.counters.reclaims.load(Ordering::Relaxed),
            releases: self.counters.releases.load(Ordering::Relaxed),
            stale_releases: self.counters.stale_releases.load(Ordering::Relaxed),
        }
    }

    fn allocate_fence(&self) -> u64 {
        self.next_fence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn deadline(from: Instant, budget: Duration) -> Instant {
        from.checked_add(budget)
            .or_else(|| from.checked_add(FAR_FUTURE))
            .unwrap_or(from)
    }
}

impl DistributedLock for LeaseLockService {
    fn try_acquire(
        &self,
        key: &LockKey,
        wait: Duration,
        lease: Duration,
        cancel: &CancellationToken,
    ) -> Result<Acquisition> {
        if lease.is_zero() {
            return Err(Error::invalid_input(format!(
                "lease budget for {} must be non-zero",
                key
            )));
        }

        let started = Instant::now();
        let deadline = Self::deadline(started, wait);
        let holder = HolderId::new();
        let mut leases = self.leases.lock();

        loop {
            if cancel.is_cancelled() {
                self.counters.cancellations.fetch_add(1, Ordering::Relaxed);
                debug!(target: "flashdeal::lock", key = %key, "Acquisition cancelled");
                return Ok(Acquisition::Cancelled);
            }

            let now = Instant::now();
            let holder_expiry = match leases.get(key) {
                None => None,
                Some(entry) if entry.is_expired(now) => {
                    self.counters.reclaims.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        target: "flashdeal::lock",
                        key = %key,
                        expired_holder = %entry.holder,
                        expired_fence = entry.fence,
                        "Reclaiming expired lease"
                    );
                    None
                }
                Some(entry) => Some(entry.expires_at),
            };

            let Some(holder_expiry) = holder_expiry else {
                let fence = self.allocate_fence();
                leases.insert(
                    key.clone(),
                    LeaseEntry {
                        holder,
                        fence,
                        expires_at: Self::deadline(now, lease),
                    },
                );
                self.counters.grants.fetch_add(1, Ordering::Relaxed);
                debug!(
                    target: "flashdeal::lock",
                    key = %key,
                    holder = %holder,
                    fence,
                    waited_us = started.elapsed().as_micros() as u64,
                    "Lease granted"
                );
                return Ok(Acquisition::Acquired(Lease::new(
                    key.clone(),
                    holder,
                    fence,
                    lease,
                    now,
                )));
            };

            if now >= deadline {
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                let waited = started.elapsed();
                debug!(
                    target: "flashdeal::lock",
                    key = %key,
                    waited_ms = waited.as_millis() as u64,
                    "Acquisition timed out"
                );
                return Ok(Acquisition::TimedOut { waited });
            }

            let slice = deadline
                .min(holder_expiry)
                .saturating_duration_since(now)
                .min(WAIT_SLICE);
            self.released.wait_for(&mut leases, slice);
        }
    }

    fn release(&self, lease: &Lease) -> Result<ReleaseOutcome> {
        let now = Instant::now();
        let mut leases = self.leases.lock();

        let owned = leases
            .get(lease.key())
            .map(|entry| entry.holder == lease.holder() && entry.fence == lease.fence())
            .unwrap_or(false);

        if !owned {
            drop(leases);
            self.counters.stale_releases.fetch_add(1, Ordering::Relaxed);
            warn!(
                target: "flashdeal::lock",
                key = %lease.key(),
                fence = lease.fence(),
                held_ms = lease.held_for().as_millis() as u64,
                "Release found lease already reclaimed by another holder"
            );
            return Ok(ReleaseOutcome::AlreadyExpired);
        }

        let expired = leases
            .remove(lease.key())
            .map(|entry| entry.is_expired(now))
            .unwrap_or(true);
        drop(leases);
        self.released.notify_all();

        if expired {
            self.counters.stale_releases.fetch_add(1, Ordering::Relaxed);
            warn!(
                target: "flashdeal::lock",
                key = %lease.key(),
                fence = lease.fence(),
                held_ms = lease.held_for().as_millis() as u64,
                budget_ms = lease.budget().as_millis() as u64,
                "Critical section outlived its lease"
            );
            return Ok(ReleaseOutcome::AlreadyExpired);
        }

        self.counters.releases.fetch_add(1, Ordering::Relaxed);
        debug!(target: "flashdeal::lock", key = %lease.key(), fence = lease.fence(), "Lease released");
        Ok(ReleaseOutcome::Released)
    }
}
