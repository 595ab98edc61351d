//! Acquisition wait bound and timeout semantics.

use std::time::Duration;

/// Default bound on the time spent waiting to acquire the primitive.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// What a timed-out acquisition means to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockBehavior {
    /// Absorb the timeout: the guard is constructed without holding the
    /// primitive and the caller proceeds into its critical section.
    ///
    /// This preserves the historical semantics of the cache this crate
    /// guards: the timed wait is a serialization aid, not a gate. Under
    /// contention longer than the timeout two holders may overlap.
    #[default]
    BestEffort,

    /// Fail the acquisition with [`CacheLockError::LockTimeout`]; the guard
    /// is never constructed and the critical section is not entered.
    ///
    /// [`CacheLockError::LockTimeout`]: crate::error::CacheLockError::LockTimeout
    Strict,
}

/// Configuration for scoped lock acquisition.
#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// Maximum time to wait for the primitive.
    pub timeout: Duration,

    /// Semantics when the wait times out.
    pub behavior: LockBehavior,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOCK_TIMEOUT,
            behavior: LockBehavior::BestEffort,
        }
    }
}

impl LockOptions {
    /// Options with the given timeout and the default best-effort behavior.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Options that treat a timed-out wait as an error.
    pub fn strict(timeout: Duration) -> Self {
        Self {
            timeout,
            behavior: LockBehavior::Strict,
        }
    }
}
