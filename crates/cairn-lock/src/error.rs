//! Error types for lock operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while acquiring or releasing a repository lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another holder owns the lock for this location.
    #[error("repository is locked: {}", location.display())]
    Locked { location: PathBuf },

    /// I/O error on the lock resource.
    #[error("lock I/O error at {}: {source}", location.display())]
    Io {
        location: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The in-process lock registry was poisoned by a panic.
    #[error("lock registry poisoned: {0}")]
    Poisoned(String),
}

impl LockError {
    /// Returns `true` if the lock is held by someone else.
    pub fn is_contended(&self) -> bool {
        matches!(self, LockError::Locked { .. })
    }
}

/// Convenience type alias for lock operations.
pub type LockResult<T> = std::result::Result<T, LockError>;
