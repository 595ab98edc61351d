//! Error types for the ccache-lock crate.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use thiserror::Error;

/// Main error type for cache file handle and lock operations.
#[derive(Error, Debug)]
pub enum CacheLockError {
    /// The named primitive could not be created or opened, or acquisition
    /// failed for a reason other than timing out.
    #[error("Lock failure: {0}")]
    Lock(String),

    /// Acquisition did not complete within the configured timeout.
    ///
    /// Only raised under [`LockBehavior::Strict`](crate::mutex::LockBehavior);
    /// the default best-effort behavior absorbs timeouts silently.
    #[error("Lock acquisition timed out: {0}")]
    LockTimeout(String),

    /// The primitive was released without being held by the caller.
    #[error("Invalid lock operation: {0}")]
    NotHeld(String),

    /// The protected file could not be opened or its path resolved.
    #[error("{0}")]
    Handle(String),
}

/// Result type alias for ccache-lock operations.
pub type Result<T> = std::result::Result<T, CacheLockError>;
