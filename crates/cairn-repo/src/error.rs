use std::fmt;
use std::path::PathBuf;

use cairn_datastore::DatastoreError;
use cairn_lock::LockError;
use cairn_types::{Cid, TypeError};
use thiserror::Error;

/// Boxed error returned by a migration step.
pub type MigrationFailure = Box<dyn std::error::Error + Send + Sync>;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("repository not initialized at {}", .0.display())]
    NotInitialized(PathBuf),

    #[error("repository already initialized at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    /// Another holder owns the repository lock.
    #[error("repository is locked: {}", .0.display())]
    Locked(PathBuf),

    #[error("repository is already open")]
    AlreadyOpen,

    /// The operation requires an open repository.
    #[error("repository is closed")]
    Closed,

    /// Stored version is older and no migration path is available or enabled.
    #[error("repository version {stored} is older than expected version {expected}")]
    VersionMismatch { stored: u64, expected: u64 },

    /// Stored version is newer than this software supports.
    #[error("repository version {stored} is newer than supported version {supported}")]
    UnsupportedVersion { stored: u64, supported: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Failure in a storage backend, with the operation and target it hit.
    #[error("backend error during {op} on {target}: {source}")]
    Backend {
        op: &'static str,
        target: String,
        #[source]
        source: DatastoreError,
    },

    /// A bulk block write stopped early. `stored` lists every block that is
    /// durable, in input order.
    #[error("put_many stopped at block {failed} after storing {} blocks: {source}", .stored.len())]
    PutMany {
        stored: Vec<Cid>,
        failed: Cid,
        #[source]
        source: Box<RepoError>,
    },

    /// Lock I/O failure other than contention.
    #[error("lock error: {0}")]
    Lock(#[source] LockError),

    #[error("migration from version {from} to {to} failed: {source}")]
    Migration {
        from: u64,
        to: u64,
        #[source]
        source: MigrationFailure,
    },

    #[error("invalid version marker: {0:?}")]
    InvalidVersion(String),

    #[error("invalid key: {0}")]
    InvalidKey(#[from] TypeError),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepoError {
    /// Adapter for `map_err` that attaches operation and target context.
    pub(crate) fn backend(op: &'static str, target: impl fmt::Display) -> impl FnOnce(DatastoreError) -> RepoError {
        let target = target.to_string();
        move |source| RepoError::Backend { op, target, source }
    }

    /// Check if this error indicates the resource doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound(_))
    }

    /// Check if this error is a lifecycle precondition failure.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            RepoError::NotInitialized(_)
                | RepoError::AlreadyInitialized(_)
                | RepoError::Locked(_)
                | RepoError::AlreadyOpen
                | RepoError::Closed
        )
    }
}

impl From<LockError> for RepoError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Locked { location } => RepoError::Locked(location),
            other => RepoError::Lock(other),
        }
    }
}

/// Result alias for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        let not_found = RepoError::NotFound("/config".into());
        assert!(not_found.is_not_found());
        assert!(!not_found.is_lifecycle());

        assert!(RepoError::Closed.is_lifecycle());
        assert!(RepoError::Locked(PathBuf::from("/r")).is_lifecycle());
        assert!(!RepoError::Closed.is_not_found());
    }

    #[test]
    fn contended_lock_maps_to_locked() {
        let err: RepoError = LockError::Locked {
            location: PathBuf::from("/repo"),
        }
        .into();
        assert!(matches!(err, RepoError::Locked(p) if p == PathBuf::from("/repo")));

        let err: RepoError = LockError::Poisoned("boom".into()).into();
        assert!(matches!(err, RepoError::Lock(_)));
    }

    #[test]
    fn backend_context_in_message() {
        let err = RepoError::backend("get", "/config")(DatastoreError::Backend("disk gone".into()));
        let msg = err.to_string();
        assert!(msg.contains("get"));
        assert!(msg.contains("/config"));
        assert!(msg.contains("disk gone"));
    }
}
