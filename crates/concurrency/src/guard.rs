//! Scoped lease ownership
//!
//! A [`LeaseGuard`] owns a granted lease and releases it exactly once:
//! explicitly through [`LeaseGuard::release`], which propagates lock-service
//! faults, or implicitly on drop (early return, `?`, unwinding panic), which
//! can only log them.

use tracing::{debug, error, warn};

use flashdeal_core::{DistributedLock, Lease, ReleaseOutcome, Result};

/// Owns a lease until released
#[must_use = "dropping the guard releases the lease immediately"]
pub struct LeaseGuard<'a, L: DistributedLock + ?Sized> {
    lock: &'a L,
    lease: Lease,
    released: bool,
}

impl<'a, L: DistributedLock + ?Sized> LeaseGuard<'a, L> {
    /// Take ownership of a granted lease
    pub fn new(lock: &'a L, lease: Lease) -> Self {
        Self {
            lock,
            lease,
            released: false,
        }
    }

    /// The held lease
    pub fn lease(&self) -> &Lease {
        &self.lease
    }

    /// Release the lease now
    ///
    /// # Errors
    ///
    /// Returns the lock service's error. The guard counts as released either
    /// way; drop will not retry.
    pub fn release(mut self) -> Result<ReleaseOutcome> {
        self.released = true;
        let outcome = self.lock.release(&self.lease)?;
        if outcome == ReleaseOutcome::AlreadyExpired {
            warn!(
                target: "flashdeal::lock",
                key = %self.lease.key(),
                held_ms = self.lease.held_for().as_millis() as u64,
                budget_ms = self.lease.budget().as_millis() as u64,
                "Lease expired before release"
            );
        }
        Ok(outcome)
    }
}

impl<L: DistributedLock + ?Sized> Drop for LeaseGuard<'_, L> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.lock.release(&self.lease) {
            Ok(outcome) => debug!(
                target: "flashdeal::lock",
                key = %self.lease.key(),
                ?outcome,
                "Lease released on scope exit"
            ),
            Err(e) => error!(
                target: "flashdeal::lock",
                key = %self.lease.key(),
                error = %e,
                "Failed to release lease on scope exit; it will expire on its own"
            ),
        }
    }
}
