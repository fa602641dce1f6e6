use std::fmt;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::LockResult;

type ReleaseFn = Box<dyn FnOnce() -> LockResult<()> + Send + Sync>;

/// Token proving ownership of a repository lock.
///
/// Releasing is idempotent. Dropping a handle that was never released
/// releases it, so an early return or panic cannot leave a lock half-held.
pub struct LockHandle {
    location: PathBuf,
    release: Option<ReleaseFn>,
}

impl LockHandle {
    /// Wrap a release action for the lock on `location`.
    ///
    /// Lock managers call this once the lock is fully acquired.
    pub fn new(
        location: impl Into<PathBuf>,
        release: impl FnOnce() -> LockResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            location: location.into(),
            release: Some(Box::new(release)),
        }
    }

    /// The repository location this handle locks.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Returns `true` once [`LockHandle::release`] has run.
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    /// Release the lock. Later calls are no-ops.
    pub fn release(&mut self) -> LockResult<()> {
        match self.release.take() {
            Some(release) => release(),
            None => Ok(()),
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(location = %self.location.display(), error = %e, "failed to release lock on drop");
        }
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("location", &self.location)
            .field("released", &self.is_released())
            .finish()
    }
}
