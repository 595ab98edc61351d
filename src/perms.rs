//! One-time probe for the restrictive-permission capability.
//!
//! When a cache file is opened for write access it may have just been
//! created, and on platforms that support per-user file modes it must be
//! readable by the owning user only. The capability is resolved exactly
//! once per process into an optional callable; callers branch on its
//! presence and never re-probe.
//!
//! Failure to apply the restriction is non-fatal by contract: the caller
//! swallows any error the callable returns.

use std::fs::File;
use std::io;
use std::sync::LazyLock;

/// Callable applying owner-only permissions to an open descriptor.
pub type RestrictFn = fn(&File) -> io::Result<()>;

static RESTRICT_TO_OWNER: LazyLock<Option<RestrictFn>> = LazyLock::new(probe);

/// The restrictive-permission capability for this platform, if any.
///
/// Resolved on first use and cached for the lifetime of the process.
pub fn restrict_to_owner() -> Option<RestrictFn> {
    *RESTRICT_TO_OWNER
}

#[cfg(unix)]
fn probe() -> Option<RestrictFn> {
    Some(apply_owner_only)
}

/// Restrict the descriptor to user read/write (0600).
#[cfg(unix)]
fn apply_owner_only(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = file.metadata()?.permissions();
    perms.set_mode(0o600);
    file.set_permissions(perms)
}

// Windows has no per-user file mode API of this shape; files keep the
// default ACLs of their directory.
#[cfg(not(unix))]
fn probe() -> Option<RestrictFn> {
    None
}
