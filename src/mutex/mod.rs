//! Named cross-process mutex guarding a cache file.
//!
//! This module implements the exclusive primitive that serializes every
//! access to a credential cache file, across processes and across threads
//! within a process:
//! - [`NamedLock`]: open-or-create handle to the system-visible primitive
//! - [`LockGuard`]: RAII scoped acquisition with release on every exit path
//! - [`LockOptions`] / [`LockBehavior`]: wait bound and timeout semantics
//!
//! # Backends
//!
//! The primitive is platform-conditional behind one contract:
//! - **Windows**: a kernel named mutex in the global object namespace.
//! - **Unix**: an advisory `flock(2)` lock file in the system temp
//!   directory, acquired by bounded polling.
//!
//! # Lock Metadata
//!
//! On the lock-file backend each acquisition records JSON metadata
//! (`owner`, `pid`, `created_at`, `action`) in the lock file. Metadata is
//! purely diagnostic; correctness never depends on it.
//!
//! # Timeout Semantics
//!
//! Waiting is bounded by [`LockOptions::timeout`]. Under the default
//! [`LockBehavior::BestEffort`] a timed-out wait is absorbed and the caller
//! proceeds without holding the primitive, which preserves the historical
//! semantics of the cache this crate guards. [`LockBehavior::Strict`] turns
//! a timeout into an error instead.

mod guard;
mod metadata;
mod named;
mod options;

#[cfg(test)]
mod tests;

// Re-export public API
pub use guard::LockGuard;
pub use metadata::LockMetadata;
pub use named::NamedLock;
pub use options::{DEFAULT_LOCK_TIMEOUT, LockBehavior, LockOptions};
