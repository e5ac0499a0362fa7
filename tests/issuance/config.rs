//! Configuration Tests
//!
//! A service built from `flashdeal.toml` uses the file's lock sizing.

use crate::common::*;
use flashdeal::{FlashdealConfig, CONFIG_FILE_NAME};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn service_from_default_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    FlashdealConfig::write_default_if_missing(&path).unwrap();

    let config = FlashdealConfig::from_file(&path).unwrap();
    let service = StockService::from_config(
        Arc::new(MemoryRecordStore::new()),
        Arc::new(LeaseLockService::new()),
        &config,
    )
    .unwrap();

    assert_eq!(service.lock_options(), &LockOptions::default());
    let id = service.create_stock("coupon", 1).unwrap().id();
    assert!(service.issue_safe(id).unwrap().success);
}

#[test]
fn configured_prefix_and_wait_are_used() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        "lock_key_prefix = \"deal:lock:\"\nacquire_wait_ms = 10\nhold_lease_ms = 5000\n",
    )
    .unwrap();
    let config = FlashdealConfig::from_file(&path).unwrap();

    let lock = Arc::new(LeaseLockService::new());
    let service = StockService::from_config(
        Arc::new(MemoryRecordStore::new()),
        Arc::clone(&lock),
        &config,
    )
    .unwrap();
    let id = service.create_stock("coupon", 5).unwrap().id();

    let key = LockKey::for_stock("deal:lock:", id);
    assert_eq!(service.lock_options().key_for(id), key);
    let held = lock
        .try_acquire(&key, Duration::ZERO, Duration::from_secs(5), &CancellationToken::new())
        .unwrap();
    assert!(held.is_acquired());

    let report = service.issue_safe(id).unwrap();
    assert_eq!(report.outcome, IssueOutcome::LockTimeout);
    assert_eq!(report.issued_count, 0);
}
