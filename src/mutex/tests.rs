//! Tests for the named mutex subsystem.

use super::*;
use crate::error::CacheLockError;
use chrono::{Duration as ChronoDuration, Utc};
use serial_test::serial;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Unique cache path so each test gets its own primitive.
fn test_cache_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("cache.bin")
}

const SHORT_TIMEOUT: Duration = Duration::from_millis(50);
const AMPLE_TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn metadata_creation() {
    let meta = LockMetadata::new("write");

    assert!(!meta.owner.is_empty());
    assert!(meta.pid.is_some());
    assert_eq!(meta.action, "write");
    assert!(meta.age().num_minutes() < 1);
}

#[test]
fn metadata_serialization_round_trips() {
    let meta = LockMetadata::new("read");
    let json = meta.to_json().unwrap();

    assert!(json.contains("owner"));
    assert!(json.contains("created_at"));
    assert!(json.contains("read"));

    let parsed: LockMetadata = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.action, "read");
    assert_eq!(parsed.owner, meta.owner);
}

#[test]
fn metadata_age_string_scales_with_age() {
    let mut meta = LockMetadata::new("write");

    assert!(meta.age_string().ends_with('s'));

    meta.created_at = Utc::now() - ChronoDuration::minutes(3);
    assert!(meta.age_string().contains('m'));

    meta.created_at = Utc::now() - ChronoDuration::hours(2);
    assert!(meta.age_string().contains('h'));
}

#[test]
fn metadata_from_file_rejects_garbage() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("garbage");
    std::fs::write(&path, b"not metadata").unwrap();

    let err = LockMetadata::from_file(&path).unwrap_err();
    assert!(matches!(err, CacheLockError::Lock(_)));
    assert!(err.to_string().contains("garbage"));
}

#[test]
fn metadata_describe_names_the_last_recorded_holder() {
    let meta = LockMetadata::new("write");
    let description = meta.describe();

    // Metadata outlives release, so the description must not claim the
    // holder is current.
    assert!(description.starts_with("last recorded holder:"));
    assert!(description.contains(&meta.owner));
    assert!(description.contains("action: write"));
}

#[test]
fn create_derives_namespaced_name() {
    let temp_dir = TempDir::new().unwrap();
    let lock = NamedLock::create(&test_cache_path(&temp_dir)).unwrap();

    assert!(lock.name().starts_with("Global_mutex_"));
    assert!(lock.name().ends_with("cache.bin"));
}

#[test]
fn create_twice_attaches_to_the_same_primitive() {
    let temp_dir = TempDir::new().unwrap();
    let path = test_cache_path(&temp_dir);

    // Open-or-create must not fail because the primitive already exists.
    let first = NamedLock::create(&path).unwrap();
    let second = NamedLock::create(&path).unwrap();
    assert_eq!(first.name(), second.name());
}

#[test]
fn acquire_and_release() {
    let temp_dir = TempDir::new().unwrap();
    let lock = NamedLock::create(&test_cache_path(&temp_dir)).unwrap();

    assert!(lock.acquire(AMPLE_TIMEOUT, "write").unwrap());
    lock.release().unwrap();
}

#[test]
fn release_without_holding_is_invalid() {
    let temp_dir = TempDir::new().unwrap();
    let lock = NamedLock::create(&test_cache_path(&temp_dir)).unwrap();

    let err = lock.release().unwrap_err();
    assert!(matches!(err, CacheLockError::NotHeld(_)));
}

#[test]
fn double_release_is_invalid() {
    let temp_dir = TempDir::new().unwrap();
    let lock = NamedLock::create(&test_cache_path(&temp_dir)).unwrap();

    assert!(lock.acquire(AMPLE_TIMEOUT, "write").unwrap());
    lock.release().unwrap();

    let err = lock.release().unwrap_err();
    assert!(matches!(err, CacheLockError::NotHeld(_)));
}

// Same-thread contention: only meaningful on the lock-file backend, since
// the Windows kernel mutex is recursive per thread.
#[cfg(unix)]
#[test]
fn contended_acquire_times_out_without_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = test_cache_path(&temp_dir);

    let holder = NamedLock::create(&path).unwrap();
    let waiter = NamedLock::create(&path).unwrap();

    assert!(holder.acquire(AMPLE_TIMEOUT, "write").unwrap());

    // Second participant times out; no error is raised.
    assert!(!waiter.acquire(SHORT_TIMEOUT, "write").unwrap());

    holder.release().unwrap();

    // Once released, the waiter gets it.
    assert!(waiter.acquire(AMPLE_TIMEOUT, "write").unwrap());
    waiter.release().unwrap();
}

#[test]
#[serial]
fn blocked_acquire_proceeds_when_holder_releases() {
    let temp_dir = TempDir::new().unwrap();
    let path = test_cache_path(&temp_dir);

    let holder = NamedLock::create(&path).unwrap();
    assert!(holder.acquire(AMPLE_TIMEOUT, "write").unwrap());

    let waiter_path = path.clone();
    let waiter = std::thread::spawn(move || {
        let lock = NamedLock::create(&waiter_path).unwrap();
        let start = Instant::now();
        let acquired = lock.acquire(AMPLE_TIMEOUT, "write").unwrap();
        lock.release().unwrap();
        (acquired, start.elapsed())
    });

    std::thread::sleep(Duration::from_millis(100));
    holder.release().unwrap();

    let (acquired, waited) = waiter.join().unwrap();
    assert!(acquired);
    assert!(waited >= Duration::from_millis(50));
    assert!(waited < AMPLE_TIMEOUT);
}

#[test]
fn dropping_the_owner_releases_the_primitive() {
    let temp_dir = TempDir::new().unwrap();
    let path = test_cache_path(&temp_dir);

    let holder = NamedLock::create(&path).unwrap();
    assert!(holder.acquire(AMPLE_TIMEOUT, "write").unwrap());

    // Disposing the owner disposes the primitive it holds.
    drop(holder);

    let next = NamedLock::create(&path).unwrap();
    assert!(next.acquire(AMPLE_TIMEOUT, "write").unwrap());
    next.release().unwrap();
}

#[cfg(unix)]
#[test]
fn lock_file_is_openable_by_other_users() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let lock = NamedLock::create(&test_cache_path(&temp_dir)).unwrap();

    // Machine-wide scope: another user's open-or-create must attach, not
    // fail with EACCES, regardless of this process's umask.
    let lock_file = std::env::temp_dir().join(lock.name());
    let mode = std::fs::metadata(&lock_file).unwrap().permissions().mode();
    assert_eq!(mode & 0o666, 0o666);
}

#[cfg(unix)]
#[test]
fn holder_info_reports_metadata_while_held() {
    let temp_dir = TempDir::new().unwrap();
    let path = test_cache_path(&temp_dir);

    let lock = NamedLock::create(&path).unwrap();
    assert!(lock.acquire(AMPLE_TIMEOUT, "write").unwrap());

    let info = lock.holder_info().unwrap();
    assert!(info.contains("action: write"));
    assert!(info.contains(&std::process::id().to_string()));

    lock.release().unwrap();
}

#[test]
fn guard_releases_on_drop() {
    let temp_dir = TempDir::new().unwrap();
    let path = test_cache_path(&temp_dir);

    let lock = NamedLock::create(&path).unwrap();
    let options = LockOptions::default();

    {
        let guard = LockGuard::acquire(&lock, &options, "write").unwrap();
        assert!(guard.is_acquired());
    }

    // Guard went out of scope; the primitive is free again.
    assert!(lock.acquire(SHORT_TIMEOUT, "write").unwrap());
    lock.release().unwrap();
}

#[test]
fn guard_manual_release() {
    let temp_dir = TempDir::new().unwrap();
    let path = test_cache_path(&temp_dir);

    let lock = NamedLock::create(&path).unwrap();
    let guard = LockGuard::acquire(&lock, &LockOptions::default(), "read").unwrap();

    guard.release().unwrap();

    assert!(lock.acquire(SHORT_TIMEOUT, "read").unwrap());
    lock.release().unwrap();
}

#[cfg(unix)]
#[test]
fn best_effort_guard_absorbs_timeout() {
    let temp_dir = TempDir::new().unwrap();
    let path = test_cache_path(&temp_dir);

    let holder = NamedLock::create(&path).unwrap();
    assert!(holder.acquire(AMPLE_TIMEOUT, "write").unwrap());

    let waiter = NamedLock::create(&path).unwrap();
    let options = LockOptions::with_timeout(SHORT_TIMEOUT);

    // Execution proceeds past the acquire call with a guard that holds
    // nothing; no error is raised.
    let guard = LockGuard::acquire(&waiter, &options, "write").unwrap();
    assert!(!guard.is_acquired());
    drop(guard);

    holder.release().unwrap();
}

#[cfg(unix)]
#[test]
fn strict_guard_raises_on_timeout() {
    let temp_dir = TempDir::new().unwrap();
    let path = test_cache_path(&temp_dir);

    let holder = NamedLock::create(&path).unwrap();
    assert!(holder.acquire(AMPLE_TIMEOUT, "write").unwrap());

    let waiter = NamedLock::create(&path).unwrap();
    let options = LockOptions::strict(SHORT_TIMEOUT);

    let err = LockGuard::acquire(&waiter, &options, "write").unwrap_err();
    assert!(matches!(err, CacheLockError::LockTimeout(_)));

    holder.release().unwrap();
}

#[cfg(unix)]
#[test]
fn releasing_an_unacquired_guard_is_invalid() {
    let temp_dir = TempDir::new().unwrap();
    let path = test_cache_path(&temp_dir);

    let holder = NamedLock::create(&path).unwrap();
    assert!(holder.acquire(AMPLE_TIMEOUT, "write").unwrap());

    let waiter = NamedLock::create(&path).unwrap();
    let guard = LockGuard::acquire(&waiter, &LockOptions::with_timeout(SHORT_TIMEOUT), "write")
        .unwrap();
    assert!(!guard.is_acquired());

    let err = guard.release().unwrap_err();
    assert!(matches!(err, CacheLockError::NotHeld(_)));

    holder.release().unwrap();
}

#[test]
fn default_options_match_contract() {
    let options = LockOptions::default();
    assert_eq!(options.timeout, DEFAULT_LOCK_TIMEOUT);
    assert_eq!(options.behavior, LockBehavior::BestEffort);
    assert_eq!(DEFAULT_LOCK_TIMEOUT, Duration::from_millis(5000));
}
