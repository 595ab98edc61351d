//! The named process-wide exclusive primitive and its platform backends.

use crate::error::{CacheLockError, Result};
use crate::name;
use std::path::Path;
use std::time::Duration;

/// Open-or-create handle to the system-visible exclusive primitive guarding
/// one cache file.
///
/// All processes (and all threads within a process) that derive the same
/// object name attach to the same underlying primitive: the first to create
/// the name owns the canonical kernel object or lock file, and later opens
/// attach to it. The open-or-create race between processes is resolved by
/// the OS.
///
/// Ownership semantics follow the backing primitive: the Windows kernel
/// mutex is recursive per thread, while the Unix lock file is not.
#[derive(Debug)]
pub struct NamedLock {
    name: String,
    inner: imp::Inner,
}

impl NamedLock {
    /// Open or create the primitive guarding `path`.
    ///
    /// `path` must already be canonicalized; the object name is a pure
    /// function of it. Failure to create or open the primitive (for
    /// example an unusable lock directory or insufficient privilege for
    /// the global namespace) is fatal and propagates with no retry.
    pub fn create(path: &Path) -> Result<Self> {
        let name = name::mutex_name(path);
        let inner = imp::Inner::open_or_create(&name)?;

        Ok(Self { name, inner })
    }

    /// The system-visible object name of this primitive.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block the calling thread until the primitive is obtained or
    /// `timeout` elapses.
    ///
    /// Returns `Ok(true)` when acquired and `Ok(false)` on timeout; timing
    /// out is not an error at this layer. `action` labels the acquisition
    /// in the diagnostic lock metadata.
    pub fn acquire(&self, timeout: Duration, action: &str) -> Result<bool> {
        self.inner.acquire(timeout, action)
    }

    /// Release the primitive held by the caller.
    ///
    /// Releasing without holding fails with [`CacheLockError::NotHeld`].
    pub fn release(&self) -> Result<()> {
        self.inner.release()
    }

    /// Describe the last recorded holder, if the backend records one.
    ///
    /// Used for timeout diagnostics; returns `None` on backends without
    /// holder metadata or when no metadata could be read. The metadata
    /// survives release, so the described holder may already be gone.
    pub fn holder_info(&self) -> Option<String> {
        self.inner.holder_info()
    }
}

/// Unix backend: an advisory `flock(2)` lock file in the system temp
/// directory, named by the object name.
///
/// Each acquisition opens its own descriptor, so two threads of one
/// process contend through the kernel exactly like two processes do. The
/// lock file is created world read-writable so that any user can attach
/// to the primitive, and it is never unlinked: removing it would race
/// with a concurrent open, handing out two locks on different inodes.
#[cfg(unix)]
mod imp {
    use super::*;
    use crate::mutex::metadata::LockMetadata;
    use fs2::FileExt;
    use std::fs::{File, OpenOptions};
    use std::io::{Seek, SeekFrom, Write};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Instant;

    /// How often a blocked acquisition re-attempts the flock.
    const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(10);

    #[derive(Debug)]
    pub(super) struct Inner {
        lock_path: PathBuf,

        /// Descriptor currently holding the flock, if any. Present exactly
        /// while this instance holds the primitive.
        held: Mutex<Option<File>>,

        /// Open-or-create witness; holds the lock file open for the
        /// lifetime of the owning instance and closes it exactly once.
        _handle: File,
    }

    impl Inner {
        pub(super) fn open_or_create(name: &str) -> super::Result<Self> {
            let lock_path = std::env::temp_dir().join(name);

            // O_CREAT without O_EXCL: creating and attaching are the same
            // operation, so a create race between processes is benign.
            let handle = open_lock_file(&lock_path)?;

            Ok(Self {
                lock_path,
                held: Mutex::new(None),
                _handle: handle,
            })
        }

        pub(super) fn acquire(&self, timeout: Duration, action: &str) -> super::Result<bool> {
            let file = open_lock_file(&self.lock_path)?;
            let deadline = Instant::now() + timeout;

            loop {
                match file.try_lock_exclusive() {
                    Ok(()) => break,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        let now = Instant::now();
                        if now >= deadline {
                            return Ok(false);
                        }
                        std::thread::sleep(ACQUIRE_POLL_INTERVAL.min(deadline - now));
                    }
                    Err(e) => {
                        return Err(CacheLockError::Lock(format!(
                            "failed to lock '{}': {}",
                            self.lock_path.display(),
                            e
                        )));
                    }
                }
            }

            write_metadata(&file, action);

            let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
            *held = Some(file);

            Ok(true)
        }

        pub(super) fn release(&self) -> super::Result<()> {
            let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());

            match held.take() {
                Some(file) => FileExt::unlock(&file).map_err(|e| {
                    CacheLockError::Lock(format!(
                        "failed to unlock '{}': {}",
                        self.lock_path.display(),
                        e
                    ))
                }),
                None => Err(CacheLockError::NotHeld(format!(
                    "lock '{}' is not held by this handle",
                    self.lock_path.display()
                ))),
            }
        }

        pub(super) fn holder_info(&self) -> Option<String> {
            LockMetadata::from_file(&self.lock_path)
                .ok()
                .map(|meta| meta.describe())
        }
    }

    fn open_lock_file(path: &Path) -> super::Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| {
                CacheLockError::Lock(format!(
                    "failed to open lock file '{}': {}",
                    path.display(),
                    e
                ))
            })?;

        // The umask leaves a fresh lock file writable by its creator
        // only, which would turn another user's open-or-create into a
        // fatal EACCES instead of attaching. The machine-wide scope
        // needs every user to open and flock the same file, so widen it
        // to 0666. Best effort: on an existing file the mode is already
        // settled, possibly by another user.
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = file.set_permissions(std::fs::Permissions::from_mode(0o666));
        }

        Ok(file)
    }

    /// Record holder metadata in the lock file. Best effort: metadata is
    /// diagnostic only, so every failure here is ignored.
    fn write_metadata(mut file: &File, action: &str) {
        let meta = LockMetadata::new(action);
        if let Ok(json) = meta.to_json() {
            let _ = file.set_len(0);
            let _ = file.seek(SeekFrom::Start(0));
            let _ = file.write_all(json.as_bytes());
            let _ = file.sync_all();
        }
    }
}

/// Windows backend: a kernel named mutex in the global object namespace.
///
/// The portable object name `Global_mutex_<path>` maps onto the kernel
/// namespace by turning the scope prefix into `Global\`, making the mutex
/// visible across all sessions.
#[cfg(windows)]
mod imp {
    use super::*;
    use std::os::windows::ffi::OsStrExt;

    type Handle = *mut core::ffi::c_void;

    const WAIT_OBJECT_0: u32 = 0x0;
    const WAIT_ABANDONED: u32 = 0x80;
    const WAIT_TIMEOUT: u32 = 0x102;
    const WAIT_FAILED: u32 = 0xFFFF_FFFF;

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn CreateMutexW(
            lpMutexAttributes: *mut core::ffi::c_void,
            bInitialOwner: i32,
            lpName: *const u16,
        ) -> Handle;

        fn WaitForSingleObject(hHandle: Handle, dwMilliseconds: u32) -> u32;

        fn ReleaseMutex(hMutex: Handle) -> i32;

        fn CloseHandle(hObject: Handle) -> i32;

        fn GetLastError() -> u32;
    }

    #[derive(Debug)]
    pub(super) struct Inner {
        handle: Handle,
    }

    // The handle refers to a kernel mutex, which is safe to wait on and
    // release from any thread; ownership tracking is per thread inside the
    // kernel object itself.
    unsafe impl Send for Inner {}
    unsafe impl Sync for Inner {}

    impl Inner {
        pub(super) fn open_or_create(name: &str) -> super::Result<Self> {
            // `CreateMutexW` opens the existing object when the name is
            // already registered, so the create race between processes is
            // resolved in the kernel.
            let kernel_name = format!(
                "Global\\{}",
                name.strip_prefix("Global_").unwrap_or(name)
            );

            let wide: Vec<u16> = std::ffi::OsStr::new(&kernel_name)
                .encode_wide()
                .chain(std::iter::once(0))
                .collect();

            let handle = unsafe { CreateMutexW(std::ptr::null_mut(), 0, wide.as_ptr()) };

            if handle.is_null() {
                let code = unsafe { GetLastError() };
                return Err(CacheLockError::Lock(format!(
                    "failed to create or open mutex '{}': Windows error code {}",
                    kernel_name, code
                )));
            }

            Ok(Self { handle })
        }

        pub(super) fn acquire(&self, timeout: Duration, _action: &str) -> super::Result<bool> {
            let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX - 1);

            match unsafe { WaitForSingleObject(self.handle, millis) } {
                // An abandoned mutex still grants ownership; the protected
                // file may be mid-update, but that is the caller's risk
                // with an advisory lock.
                WAIT_OBJECT_0 | WAIT_ABANDONED => Ok(true),
                WAIT_TIMEOUT => Ok(false),
                WAIT_FAILED => {
                    let code = unsafe { GetLastError() };
                    Err(CacheLockError::Lock(format!(
                        "failed to wait on mutex: Windows error code {}",
                        code
                    )))
                }
                other => Err(CacheLockError::Lock(format!(
                    "unexpected wait result {:#x}",
                    other
                ))),
            }
        }

        pub(super) fn release(&self) -> super::Result<()> {
            if unsafe { ReleaseMutex(self.handle) } == 0 {
                let code = unsafe { GetLastError() };
                return Err(CacheLockError::NotHeld(format!(
                    "mutex is not held by the calling thread (Windows error code {})",
                    code
                )));
            }

            Ok(())
        }

        pub(super) fn holder_info(&self) -> Option<String> {
            None
        }
    }

    impl Drop for Inner {
        fn drop(&mut self) {
            unsafe {
                CloseHandle(self.handle);
            }
        }
    }
}
