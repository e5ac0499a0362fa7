//! RedisLock: lease lock over a Redis server
//!
//! Acquire runs one script that does `SET key holder NX PX lease_ms` and, on
//! success, `INCR {key}:fence` for the fencing token. It is polled with
//! [`Backoff`] until the wait budget is spent. Release is a compare-and-delete
//! script so a holder whose lease already expired cannot delete a successor's
//! lease.
//!
//! Every connection carries connect, read and write timeouts. Acquisition
//! I/O is bounded by the remaining wait budget (never less than the I/O
//! timeout, so a zero wait still gets one round trip). Release is bounded by
//! the I/O timeout. An unreachable server yields an error instead of a hang.

use std::time::{Duration, Instant};

use redis::{Client, Connection, Script};
use tracing::{debug, error, warn};

use flashdeal_core::{
    Acquisition, CancellationToken, DistributedLock, Error, HolderId, Lease, LockKey,
    ReleaseOutcome, Result,
};

use crate::backoff::Backoff;

/// Default bound on release I/O and the floor for acquisition I/O
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(500);

/// Shortest socket timeout handed to the client (zero is rejected)
const MIN_IO_TIMEOUT: Duration = Duration::from_millis(1);

/// Longest `PX` sent to the server; longer budgets are clamped
pub const MAX_LEASE_MS: u64 = 1 << 40;

/// Returns the fence on grant, 0 when the key is held
const ACQUIRE_SCRIPT: &str = r#"
if redis.call("SET", KEYS[1], ARGV[1], "NX", "PX", ARGV[2]) then
    return redis.call("INCR", KEYS[2])
else
    return 0
end
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

fn lock_err(context: &str, e: redis::RedisError) -> Error {
    Error::lock_service(format!("{}: {}", context, e))
}

fn lease_millis(lease: Duration) -> u64 {
    u64::try_from(lease.as_millis())
        .unwrap_or(u64::MAX)
        .min(MAX_LEASE_MS)
}

/// Distributed lock backed by a Redis server
pub struct RedisLock {
    client: Client,
    acquire_script: Script,
    release_script: Script,
    io_timeout: Duration,
}

impl RedisLock {
    /// Open a client for `url` (e.g. `redis://127.0.0.1/`)
    ///
    /// No connection is made until the first acquisition.
    pub fn open(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| lock_err("invalid redis url", e))?;
        Ok(Self {
            client,
            acquire_script: Script::new(ACQUIRE_SCRIPT),
            release_script: Script::new(RELEASE_SCRIPT),
            io_timeout: DEFAULT_IO_TIMEOUT,
        })
    }

    /// Bound release I/O by `timeout`
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout.max(MIN_IO_TIMEOUT);
        self
    }

    /// Configured release I/O bound
    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    fn connection(&self, timeout: Duration) -> Result<Connection> {
        let timeout = timeout.max(MIN_IO_TIMEOUT);
        let conn = self
            .client
            .get_connection_with_timeout(timeout)
            .map_err(|e| lock_err("redis connect failed", e))?;
        Self::bound_io(&conn, timeout)?;
        Ok(conn)
    }

    fn bound_io(conn: &Connection, timeout: Duration) -> Result<()> {
        let timeout = Some(timeout.max(MIN_IO_TIMEOUT));
        conn.set_read_timeout(timeout)
            .map_err(|e| lock_err("redis read timeout rejected", e))?;
        conn.set_write_timeout(timeout)
            .map_err(|e| lock_err("redis write timeout rejected", e))
    }

    fn fence_key(key: &LockKey) -> String {
        format!("{{{}}}:fence", key)
    }

    fn release_token(&self, key: &LockKey, token: &str) -> Result<bool> {
        let mut conn = self.connection(self.io_timeout)?;
        let deleted: i64 = self
            .release_script
            .key(key.as_str())
            .arg(token)
            .invoke(&mut conn)
            .map_err(|e| lock_err("redis release script failed", e))?;
        Ok(deleted == 1)
    }

    /// Best-effort delete of a grant the caller will never see
    ///
    /// The acquire script may have run even though its reply was lost.
    fn abandon(&self, key: &LockKey, token: &str) {
        match self.release_token(key, token) {
            Ok(deleted) => debug!(
                target: "flashdeal::lock",
                key = %key,
                deleted,
                "Abandoned acquisition cleaned up"
            ),
            Err(e) => error!(
                target: "flashdeal::lock",
                key = %key,
                error = %e,
                "Failed to clean up abandoned acquisition; it will expire on its own"
            ),
        }
    }
}

impl DistributedLock for RedisLock {
    fn try_acquire(
        &self,
        key: &LockKey,
        wait: Duration,
        lease: Duration,
        cancel: &CancellationToken,
    ) -> Result<Acquisition> {
        let lease_ms = lease_millis(lease);
        if lease_ms == 0 {
            return Err(Error::invalid_input(format!(
                "lease budget for {} must be at least 1ms",
                key
            )));
        }

        let started = Instant::now();
        let mut conn = self.connection(wait.max(self.io_timeout))?;
        let holder = HolderId::new();
        let token = holder.to_string();
        let fence_key = Self::fence_key(key);
        let mut backoff = Backoff::default();

        loop {
            if cancel.is_cancelled() {
                debug!(target: "flashdeal::lock", key = %key, "Acquisition cancelled");
                return Ok(Acquisition::Cancelled);
            }

            let remaining = wait.saturating_sub(started.elapsed());
            Self::bound_io(&conn, remaining.max(self.io_timeout))?;
            let sent = Instant::now();
            let granted: std::result::Result<u64, _> = self
                .acquire_script
                .key(key.as_str())
                .key(&fence_key)
                .arg(&token)
                .arg(lease_ms)
                .invoke(&mut conn);

            let fence = match granted {
                Ok(fence) => fence,
                Err(e) => {
                    self.abandon(key, &token);
                    return Err(lock_err("redis acquire script failed", e));
                }
            };

            if fence > 0 {
                debug!(
                    target: "flashdeal::lock",
                    key = %key,
                    holder = %holder,
                    fence,
                    "Lease granted"
                );
                return Ok(Acquisition::Acquired(Lease::new(
                    key.clone(),
                    holder,
                    fence,
                    lease,
                    sent,
                )));
            }

            let waited = started.elapsed();
            let Some(remaining) = wait.checked_sub(waited).filter(|r| !r.is_zero()) else {
                debug!(
                    target: "flashdeal::lock",
                    key = %key,
                    waited_ms = waited.as_millis() as u64,
                    "Acquisition timed out"
                );
                return Ok(Acquisition::TimedOut { waited });
            };
            std::thread::sleep(backoff.next_delay(remaining));
        }
    }

    fn release(&self, lease: &Lease) -> Result<ReleaseOutcome> {
        if self.release_token(lease.key(), &lease.holder().to_string())? {
            Ok(ReleaseOutcome::Released)
        } else {
            warn!(
                target: "flashdeal::lock",
                key = %lease.key(),
                fence = lease.fence(),
                held_ms = lease.held_for().as_millis() as u64,
                "Lease no longer owned at release"
            );
            Ok(ReleaseOutcome::AlreadyExpired)
        }
    }
}
