//! The [`RepoLock`] trait defining the lock manager interface.

use std::fmt;
use std::path::Path;

use crate::error::LockResult;
use crate::handle::LockHandle;

/// Lock manager for repository locations.
///
/// Implementations must be thread-safe and guarantee that two concurrent
/// `acquire` calls on the same location never both succeed.
pub trait RepoLock: Send + Sync + fmt::Debug {
    /// Acquire the exclusive lock for `location`.
    ///
    /// Fails with [`LockError::Locked`](crate::LockError::Locked) if another
    /// holder owns it. Never blocks waiting for the holder.
    fn acquire(&self, location: &Path) -> LockResult<LockHandle>;

    /// Check whether some holder currently owns the lock for `location`.
    fn is_locked(&self, location: &Path) -> LockResult<bool>;
}
