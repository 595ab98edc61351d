//! ccache-lock: cross-process locking and permission hardening for on-disk
//! credential cache files.
//!
//! A credential cache is a single file shared by every process that reads
//! or renews cached tickets. This crate serializes access to it with a
//! system-visible named primitive derived from the file's canonical path,
//! and hardens newly written caches to owner-only permissions where the
//! platform allows.
//!
//! The cached bytes themselves are opaque here; protocol and serialization
//! logic live with the caller.
//!
//! # Usage
//!
//! ```no_run
//! use ccache_lock::{FileAccess, FileHandle, FileMode, FileShare};
//! use std::io::Write;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = FileHandle::new(
//!     "/tmp/krb5cc_1000",
//!     FileMode::OpenOrCreate,
//!     FileAccess::Write,
//!     FileShare::None,
//! )?;
//!
//! let _guard = handle.acquire_write_lock()?;
//! let mut stream = handle.open_stream()?;
//! stream.write_all(b"...")?;
//! # Ok(())
//! # }
//! ```
//!
//! The lock is advisory: it restrains cooperating participants only, and
//! both read and write acquisition share one exclusive primitive.

pub mod error;
pub mod handle;
pub mod mutex;
pub mod name;
pub mod perms;

pub use error::{CacheLockError, Result};
pub use handle::{FileAccess, FileHandle, FileMode, FileShare};
pub use mutex::{
    DEFAULT_LOCK_TIMEOUT, LockBehavior, LockGuard, LockMetadata, LockOptions, NamedLock,
};
