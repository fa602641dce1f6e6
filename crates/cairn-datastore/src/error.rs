use cairn_types::TypeError;

/// Errors from datastore operations.
#[derive(Debug, thiserror::Error)]
pub enum DatastoreError {
    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored entry could not be mapped back to a valid key.
    #[error("invalid key in store: {0}")]
    InvalidKey(#[from] TypeError),

    /// An in-process lock guarding the store was poisoned by a panic.
    #[error("datastore lock poisoned: {0}")]
    Poisoned(String),

    /// Failure reported by a third-party backend implementation.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Result alias for datastore operations.
pub type DatastoreResult<T> = Result<T, DatastoreError>;
