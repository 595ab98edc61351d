//! Cache file handle: serialized, permission-hardened access to one file.
//!
//! A [`FileHandle`] pairs the target file's open parameters with the named
//! primitive guarding it. Callers acquire a scoped lock, perform their I/O
//! through [`FileHandle::open_stream`], and drop the guard.
//!
//! Read and write acquisition request the *same* exclusive primitive:
//! there is no reader/writer distinction, and every access to the cache is
//! fully serialized across all cooperating participants. The lock is
//! advisory; a process that bypasses this crate can still touch the file.

use crate::error::{CacheLockError, Result};
use crate::mutex::{LockGuard, LockOptions, NamedLock};
use crate::perms;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// How the file is opened or created, mirroring the cache's historical
/// mode flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Open an existing file; fail if it does not exist.
    Open,
    /// Open an existing file or create an empty one.
    OpenOrCreate,
    /// Create the file, truncating it if it already exists.
    Create,
    /// Create the file; fail if it already exists.
    CreateNew,
    /// Open an existing file and truncate it.
    Truncate,
    /// Open or create the file and append to its end.
    Append,
}

/// Requested access to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    Read,
    Write,
    ReadWrite,
}

impl FileAccess {
    /// Whether this access requests write permission. Permission
    /// hardening only applies to write access.
    pub fn includes_write(&self) -> bool {
        matches!(self, FileAccess::Write | FileAccess::ReadWrite)
    }
}

/// Sharing granted to concurrent opens of the same file.
///
/// Enforced by the OS on Windows; advisory elsewhere, where the named
/// primitive is the only serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileShare {
    None,
    Read,
    Write,
    ReadWrite,
}

#[cfg(windows)]
impl FileShare {
    const FILE_SHARE_READ: u32 = 0x1;
    const FILE_SHARE_WRITE: u32 = 0x2;

    fn as_raw(self) -> u32 {
        match self {
            FileShare::None => 0,
            FileShare::Read => Self::FILE_SHARE_READ,
            FileShare::Write => Self::FILE_SHARE_WRITE,
            FileShare::ReadWrite => Self::FILE_SHARE_READ | Self::FILE_SHARE_WRITE,
        }
    }
}

/// Handle to a credential cache file and the primitive guarding it.
///
/// Construction resolves the canonical path, derives the object name and
/// opens-or-creates the named primitive. The handle owns exactly one
/// primitive and disposes it when dropped; the file descriptors returned
/// by [`open_stream`](FileHandle::open_stream) are owned by the caller and
/// outlive neither constraint.
#[derive(Debug)]
pub struct FileHandle {
    path: PathBuf,
    mode: FileMode,
    access: FileAccess,
    share: FileShare,
    lock: NamedLock,
    options: LockOptions,
}

impl FileHandle {
    /// Create a handle for `path` with the default lock options
    /// (5 second wait, best-effort timeout semantics).
    pub fn new(
        path: impl AsRef<Path>,
        mode: FileMode,
        access: FileAccess,
        share: FileShare,
    ) -> Result<Self> {
        Self::with_options(path, mode, access, share, LockOptions::default())
    }

    /// Create a handle with explicit lock options.
    pub fn with_options(
        path: impl AsRef<Path>,
        mode: FileMode,
        access: FileAccess,
        share: FileShare,
        options: LockOptions,
    ) -> Result<Self> {
        let path = resolve_path(path.as_ref())?;
        let lock = NamedLock::create(&path)?;

        Ok(Self {
            path,
            mode,
            access,
            share,
            lock,
            options,
        })
    }

    /// The canonical path of the protected file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The system-visible name of the guarding primitive.
    pub fn lock_name(&self) -> &str {
        self.lock.name()
    }

    /// The mode the file will be opened with.
    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// The access the file will be opened with.
    pub fn access(&self) -> FileAccess {
        self.access
    }

    /// The sharing granted to concurrent opens.
    pub fn share(&self) -> FileShare {
        self.share
    }

    /// Open the file with the handle's mode, access and share flags.
    ///
    /// When access includes write and the platform exposes the
    /// restrictive-permission capability, the opened descriptor is
    /// restricted to the owning user. A failure of that restriction is
    /// swallowed and never fails the open itself.
    pub fn open_stream(&self) -> Result<File> {
        let file = self.open_options().open(&self.path).map_err(|e| {
            CacheLockError::Handle(format!(
                "failed to open '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        if self.access.includes_write()
            && let Some(restrict) = perms::restrict_to_owner()
        {
            let _ = restrict(&file);
        }

        Ok(file)
    }

    /// Acquire the scoped lock for reading the cache.
    pub fn acquire_read_lock(&self) -> Result<LockGuard<'_>> {
        LockGuard::acquire(&self.lock, &self.options, "read")
    }

    /// Acquire the scoped lock for writing the cache.
    ///
    /// Semantically identical to [`acquire_read_lock`]: both request the
    /// same exclusive primitive.
    ///
    /// [`acquire_read_lock`]: FileHandle::acquire_read_lock
    pub fn acquire_write_lock(&self) -> Result<LockGuard<'_>> {
        LockGuard::acquire(&self.lock, &self.options, "write")
    }

    fn open_options(&self) -> OpenOptions {
        let mut opts = OpenOptions::new();

        match self.access {
            FileAccess::Read => {
                opts.read(true);
            }
            FileAccess::Write => {
                opts.write(true);
            }
            FileAccess::ReadWrite => {
                opts.read(true).write(true);
            }
        }

        match self.mode {
            FileMode::Open => {}
            FileMode::OpenOrCreate => {
                opts.create(true).truncate(false);
            }
            FileMode::Create => {
                opts.create(true).truncate(true);
            }
            FileMode::CreateNew => {
                opts.create_new(true);
            }
            FileMode::Truncate => {
                opts.truncate(true);
            }
            FileMode::Append => {
                opts.create(true).append(true);
            }
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::OpenOptionsExt;
            opts.share_mode(self.share.as_raw());
        }

        opts
    }
}

/// Resolve `path` to its canonical absolute form.
///
/// The object name must not depend on how the caller spelled the path, so
/// symlinks are resolved where possible. A cache file that does not exist
/// yet cannot be canonicalized directly; its parent directory is resolved
/// instead and the file name re-joined.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(path) {
        return Ok(canonical);
    }

    let absolute = std::path::absolute(path).map_err(|e| {
        CacheLockError::Handle(format!(
            "failed to resolve path '{}': {}",
            path.display(),
            e
        ))
    })?;

    if let (Some(parent), Some(file_name)) = (absolute.parent(), absolute.file_name())
        && let Ok(parent) = fs::canonicalize(parent)
    {
        return Ok(parent.join(file_name));
    }

    Ok(absolute)
}
