use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("key must contain at least one non-empty segment")]
    EmptyKey,

    #[error("invalid key segment {segment:?}: {reason}")]
    InvalidSegment { segment: String, reason: String },

    #[error("content identifier must not be empty")]
    EmptyCid,

    #[error("invalid hex string: {0}")]
    InvalidHex(String),
}
