//! Filesystem lock manager.
//!
//! The lock is an OS advisory exclusive lock on `<location>/repo.lock`. The
//! OS drops it when the holding process exits, so a lock is never inherited
//! across restarts. The lock file itself is left in place on release:
//! unlinking it would let a late opener lock an orphaned inode while a new
//! acquirer locks a fresh file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info};

use crate::error::{LockError, LockResult};
use crate::handle::LockHandle;
use crate::traits::RepoLock;

/// Name of the lock file inside a repository location.
pub const LOCK_FILE: &str = "repo.lock";

/// Lock manager backed by an advisory lock file.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsLock;

impl FsLock {
    pub fn new() -> Self {
        Self
    }

    /// Path of the lock file for `location`.
    pub fn lock_path(location: &Path) -> PathBuf {
        location.join(LOCK_FILE)
    }

    /// PID recorded by the most recent holder, if any.
    ///
    /// Informational only: the recorded PID may belong to a holder that has
    /// since released the lock.
    pub fn holder_pid(location: &Path) -> LockResult<Option<u32>> {
        match fs::read_to_string(Self::lock_path(location)) {
            Ok(contents) => Ok(contents.trim().parse().ok()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(location, e)),
        }
    }

    /// Remove a leftover lock file that no live holder owns.
    ///
    /// Returns `true` if a file was removed. A live lock is never touched.
    /// Must not race with acquirers on the same location.
    pub fn reclaim_stale(&self, location: &Path) -> LockResult<bool> {
        let path = Self::lock_path(location);
        let file = match OpenOptions::new().write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_error(location, e)),
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let removed = fs::remove_file(&path);
                let _ = FileExt::unlock(&file);
                removed.map_err(|e| io_error(location, e))?;
                info!(location = %location.display(), "reclaimed stale repo lock");
                Ok(true)
            }
            Err(e) if is_contended(&e) => Ok(false),
            Err(e) => Err(io_error(location, e)),
        }
    }
}

impl RepoLock for FsLock {
    fn acquire(&self, location: &Path) -> LockResult<LockHandle> {
        fs::create_dir_all(location).map_err(|e| io_error(location, e))?;
        let path = Self::lock_path(location);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_error(location, e))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if is_contended(&e) => {
                return Err(LockError::Locked {
                    location: location.to_path_buf(),
                });
            }
            Err(e) => return Err(io_error(location, e)),
        }

        // From here on the lock is held; any failure must give it back.
        if let Err(e) = write_pid(&mut file) {
            let _ = FileExt::unlock(&file);
            return Err(io_error(location, e));
        }

        debug!(location = %location.display(), "fs lock acquired");
        let owned = location.to_path_buf();
        Ok(LockHandle::new(location, move || {
            // Unlocking the open descriptor works even if the file was
            // removed externally.
            FileExt::unlock(&file).map_err(|e| io_error(&owned, e))?;
            debug!(location = %owned.display(), "fs lock released");
            Ok(())
        }))
    }

    fn is_locked(&self, location: &Path) -> LockResult<bool> {
        let file = match File::open(Self::lock_path(location)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_error(location, e)),
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                Ok(false)
            }
            Err(e) if is_contended(&e) => Ok(true),
            Err(e) => Err(io_error(location, e)),
        }
    }
}

fn write_pid(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    file.sync_all()
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn io_error(location: &Path, source: io::Error) -> LockError {
    LockError::Io {
        location: location.to_path_buf(),
        source,
    }
}
