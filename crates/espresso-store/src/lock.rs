//! Advisory locking for shared cache paths
//!
//! Registry and artifact caches are shared by every build on the machine.
//! Each check-then-populate sequence runs under an exclusive lock on a lock
//! file that sits beside the guarded path (never inside it, since presence of
//! the guarded path is the only "already cached" signal).
//!
//! Locks are `flock`-based on unix, so they exclude other threads holding
//! their own `CacheLock` as well as other processes. Contention is logged.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Default time to wait for a contended cache lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(120);

/// Lock result type
pub type LockResult<T> = Result<T, LockError>;

/// Errors from lock operations
#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out after {timeout:?} waiting for lock {path}")]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("I/O error on lock {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Exclusive advisory lock held on a lock file.
///
/// The lock is released when this struct is dropped.
#[derive(Debug)]
pub struct CacheLock {
    lock_path: PathBuf,
    lock_file: File,
}

impl CacheLock {
    /// Lock file path guarding `path`: a hidden sibling named `.<file name>.lock`.
    pub fn path_for(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cache".to_string());
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        parent.join(format!(".{}.lock", name))
    }

    /// Acquire the lock guarding `path`, waiting up to `timeout`.
    pub fn guard(path: &Path, timeout: Duration) -> LockResult<Self> {
        Self::acquire(&Self::path_for(path), timeout)
    }

    /// Acquire an exclusive lock on `lock_path`.
    ///
    /// Creates the parent directory and lock file if they don't exist.
    pub fn acquire(lock_path: &Path, timeout: Duration) -> LockResult<Self> {
        let io_err = |source| LockError::Io {
            path: lock_path.to_path_buf(),
            source,
        };

        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let start = Instant::now();
        let poll_interval = Duration::from_millis(25);
        let mut warned = false;

        loop {
            match Self::try_acquire_exclusive(lock_path) {
                Ok(file) => {
                    if warned {
                        tracing::info!(
                            lock = %lock_path.display(),
                            waited_secs = start.elapsed().as_secs_f64(),
                            "cache lock acquired after contention"
                        );
                    }
                    return Ok(Self {
                        lock_path: lock_path.to_path_buf(),
                        lock_file: file,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if !warned && start.elapsed() > Duration::from_millis(500) {
                        tracing::warn!(lock = %lock_path.display(), "cache lock contended, waiting");
                        warned = true;
                    }
                }
                Err(e) => return Err(io_err(e)),
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path: lock_path.to_path_buf(),
                    timeout,
                });
            }

            std::thread::sleep(poll_interval);
        }
    }

    #[cfg(unix)]
    fn try_acquire_exclusive(lock_path: &Path) -> io::Result<File> {
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::io::AsRawFd;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o644)
            .open(lock_path)?;

        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };

        if result == 0 {
            Ok(file)
        } else {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
            } else {
                Err(err)
            }
        }
    }

    /// Non-unix fallback: exclusive creation of the lock file.
    #[cfg(not(unix))]
    fn try_acquire_exclusive(lock_path: &Path) -> io::Result<File> {
        match OpenOptions::new().write(true).create_new(true).open(lock_path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
            }
            Err(e) => Err(e),
        }
    }

    /// Get the lock file path.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: the descriptor is still owned by `self.lock_file`.
            unsafe {
                libc::flock(self.lock_file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
