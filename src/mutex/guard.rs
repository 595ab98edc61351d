//! RAII scoped lock acquisition.

use super::named::NamedLock;
use super::options::{LockBehavior, LockOptions};
use crate::error::{CacheLockError, Result};

/// RAII guard for a scoped acquisition of a [`NamedLock`].
///
/// Acquisition happens in the constructor, bounded by the configured
/// timeout; release happens unconditionally when the guard is dropped,
/// including when the caller's critical section returns early with an
/// error. If release fails during drop, a warning is printed but no panic
/// occurs.
///
/// Under [`LockBehavior::BestEffort`] the guard may be constructed without
/// holding the primitive (the wait timed out); [`is_acquired`] reports
/// which case the caller is in, and drop only releases a held primitive.
///
/// [`is_acquired`]: LockGuard::is_acquired
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a NamedLock,

    /// Whether the wait actually obtained the primitive.
    acquired: bool,

    /// Whether the lock has been released manually.
    released: bool,
}

impl<'a> LockGuard<'a> {
    /// Acquire `lock` under `options`, labeling the acquisition with
    /// `action` for diagnostics.
    pub(crate) fn acquire(
        lock: &'a NamedLock,
        options: &LockOptions,
        action: &str,
    ) -> Result<Self> {
        let acquired = lock.acquire(options.timeout, action)?;

        if !acquired && options.behavior == LockBehavior::Strict {
            let holder = lock
                .holder_info()
                .map_or_else(String::new, |info| format!(" ({})", info));

            return Err(CacheLockError::LockTimeout(format!(
                "gave up on '{}' after {:?}{}",
                lock.name(),
                options.timeout,
                holder
            )));
        }

        Ok(Self {
            lock,
            acquired,
            released: false,
        })
    }

    /// Whether this guard actually holds the primitive.
    ///
    /// `false` only under best-effort behavior after a timed-out wait.
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Manually release the lock.
    ///
    /// This is useful when you want to release before the guard goes out
    /// of scope and handle errors explicitly. Calling this on a guard that
    /// never obtained the primitive is an invalid operation.
    pub fn release(mut self) -> Result<()> {
        self.released = true;

        if !self.acquired {
            return Err(CacheLockError::NotHeld(format!(
                "'{}' was never acquired by this guard",
                self.lock.name()
            )));
        }

        self.acquired = false;
        self.lock.release()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if !self.released
            && self.acquired
            && let Err(e) = self.lock.release()
        {
            eprintln!("Warning: failed to release '{}': {}", self.lock.name(), e);
        }
    }
}
