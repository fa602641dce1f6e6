//! Exclusive repository locks.
//!
//! At most one holder may own the lock for a given repository location at a
//! time. Acquisition is atomic with respect to other acquisition attempts on
//! the same location; release is idempotent and tolerates the lock resource
//! having been removed underneath it.
//!
//! # Lock Managers
//!
//! - [`FsLock`] -- OS advisory lock on `<location>/repo.lock` (the default)
//! - [`MemoryLock`] -- process-wide registry, for repositories without a disk footprint
//!
//! Stale-lock reclamation is always an explicit call ([`FsLock::reclaim_stale`],
//! [`MemoryLock::reclaim`]); acquisition never steals a live lock.

pub mod error;
pub mod fs;
pub mod handle;
pub mod memory;
pub mod traits;

pub use error::{LockError, LockResult};
pub use fs::{FsLock, LOCK_FILE};
pub use handle::LockHandle;
pub use memory::MemoryLock;
pub use traits::RepoLock;
