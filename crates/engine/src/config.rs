//! Issuance configuration via `flashdeal.toml`
//!
//! Lock sizing is fixed per configuration: the wait and lease budgets are read
//! once and never renewed. To change them, edit the file and rebuild the
//! service.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use flashdeal_core::{
    Error, LockOptions, Result, DEFAULT_ACQUIRE_WAIT, DEFAULT_HOLD_LEASE, DEFAULT_LOCK_KEY_PREFIX,
};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "flashdeal.toml";

/// Issuance configuration loaded from `flashdeal.toml`.
///
/// # Example
///
/// ```toml
/// lock_key_prefix = "stock:lock:"
/// acquire_wait_ms = 5000
/// hold_lease_ms = 3000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashdealConfig {
    /// Namespace prepended to the stock id to form the lock key.
    #[serde(default = "default_lock_key_prefix")]
    pub lock_key_prefix: String,
    /// How long an issuer waits for the lock, in milliseconds.
    #[serde(default = "default_acquire_wait_ms")]
    pub acquire_wait_ms: u64,
    /// How long a granted lease lives before auto-expiry, in milliseconds.
    #[serde(default = "default_hold_lease_ms")]
    pub hold_lease_ms: u64,
}

fn default_lock_key_prefix() -> String {
    DEFAULT_LOCK_KEY_PREFIX.to_string()
}

fn default_acquire_wait_ms() -> u64 {
    DEFAULT_ACQUIRE_WAIT.as_millis() as u64
}

fn default_hold_lease_ms() -> u64 {
    DEFAULT_HOLD_LEASE.as_millis() as u64
}

impl Default for FlashdealConfig {
    fn default() -> Self {
        Self {
            lock_key_prefix: default_lock_key_prefix(),
            acquire_wait_ms: default_acquire_wait_ms(),
            hold_lease_ms: default_hold_lease_ms(),
        }
    }
}

impl FlashdealConfig {
    /// Check the values a lock service would reject.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty key prefix or a zero lease.
    pub fn validate(&self) -> Result<()> {
        if self.lock_key_prefix.is_empty() {
            return Err(Error::invalid_input(
                "lock_key_prefix in flashdeal.toml must not be empty",
            ));
        }
        if self.hold_lease_ms == 0 {
            return Err(Error::invalid_input(
                "hold_lease_ms in flashdeal.toml must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Convert to the lock options issuers consume.
    pub fn lock_options(&self) -> LockOptions {
        LockOptions::new(
            self.lock_key_prefix.clone(),
            Duration::from_millis(self.acquire_wait_ms),
            Duration::from_millis(self.hold_lease_ms),
        )
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# flashdeal issuance configuration
#
# Lock key namespace; the stock id is appended (default: "stock:lock:")
lock_key_prefix = "stock:lock:"

# Maximum time an issuer waits to acquire the lock (default: 5000).
# A caller that cannot acquire within this budget gets a lock_timeout outcome.
acquire_wait_ms = 5000

# Lease lifetime; the lock auto-expires after this long (default: 3000).
# Must exceed the worst-case critical section, or two holders can overlap.
hold_lease_ms = 3000
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: FlashdealConfig = toml::from_str(&content).map_err(|e| {
            Error::invalid_input(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to write default config file '{}': {}",
                        path.display(),
                        e
                    ),
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::invalid_input(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write config file '{}': {}", path.display(), e),
            ))
        })
    }
}
