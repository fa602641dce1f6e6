//! In-process lock manager.
//!
//! [`MemoryLock`] tracks held locations in a process-wide registry. Every
//! `MemoryLock` value shares the registry, so two repository instances at the
//! same location exclude each other even when built with separate managers.
//! It does not protect against other processes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

use tracing::{debug, info};

use crate::error::{LockError, LockResult};
use crate::handle::LockHandle;
use crate::traits::RepoLock;

/// Held locations, each mapped to the token of its current holder.
fn registry() -> LockResult<MutexGuard<'static, HashMap<PathBuf, u64>>> {
    static HELD: OnceLock<Mutex<HashMap<PathBuf, u64>>> = OnceLock::new();
    HELD.get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .map_err(|e| LockError::Poisoned(e.to_string()))
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Lock manager for repositories that live in memory.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryLock;

impl MemoryLock {
    pub fn new() -> Self {
        Self
    }

    /// Forcibly release the lock on `location`, whoever holds it.
    ///
    /// Returns `true` if a lock was held. The previous holder's handle
    /// becomes inert: releasing it later does not touch a newer holder.
    pub fn reclaim(&self, location: &Path) -> LockResult<bool> {
        let reclaimed = registry()?.remove(location).is_some();
        if reclaimed {
            info!(location = %location.display(), "reclaimed memory lock");
        }
        Ok(reclaimed)
    }
}

impl RepoLock for MemoryLock {
    fn acquire(&self, location: &Path) -> LockResult<LockHandle> {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        {
            let mut held = registry()?;
            if held.contains_key(location) {
                return Err(LockError::Locked {
                    location: location.to_path_buf(),
                });
            }
            held.insert(location.to_path_buf(), token);
        }
        debug!(location = %location.display(), "memory lock acquired");

        let owned = location.to_path_buf();
        Ok(LockHandle::new(location, move || {
            let mut held = registry()?;
            if held.get(&owned) == Some(&token) {
                held.remove(&owned);
                debug!(location = %owned.display(), "memory lock released");
            }
            Ok(())
        }))
    }

    fn is_locked(&self, location: &Path) -> LockResult<bool> {
        Ok(registry()?.contains_key(location))
    }
}
