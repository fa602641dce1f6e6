//! Schema version marker.

use std::cmp::Ordering;
use std::sync::Arc;

use cairn_datastore::Datastore;
use cairn_types::Key;

use crate::error::{RepoError, RepoResult};

/// Schema version this build reads and writes.
pub const REPO_VERSION: u64 = 7;

/// Root key holding the version as decimal ASCII.
pub const VERSION_KEY: &str = "/version";

/// Reads and writes the version marker in the root namespace.
#[derive(Clone, Debug)]
pub struct VersionStore {
    root: Arc<dyn Datastore>,
    key: Key,
}

impl VersionStore {
    pub fn new(root: Arc<dyn Datastore>) -> Self {
        Self {
            root,
            key: Key::from_static(VERSION_KEY),
        }
    }

    pub fn exists(&self) -> RepoResult<bool> {
        self.root
            .has(&self.key)
            .map_err(RepoError::backend("has", &self.key))
    }

    /// Stored version. Fails with `NotFound` if none was written.
    pub fn get(&self) -> RepoResult<u64> {
        let raw = self
            .root
            .get(&self.key)
            .map_err(RepoError::backend("get", &self.key))?
            .ok_or_else(|| RepoError::NotFound(self.key.to_string()))?;
        let text = String::from_utf8_lossy(&raw);
        text.trim()
            .parse()
            .map_err(|_| RepoError::InvalidVersion(text.into_owned()))
    }

    pub fn set(&self, version: u64) -> RepoResult<()> {
        self.root
            .put(&self.key, version.to_string().as_bytes())
            .map_err(RepoError::backend("put", &self.key))
    }

    /// Compare the stored version against `expected`.
    ///
    /// Returns `Ok(None)` on a match and `Ok(Some(stored))` when the stored
    /// version is older. A newer stored version is never acceptable.
    pub fn check(&self, expected: u64) -> RepoResult<Option<u64>> {
        let stored = self.get()?;
        match stored.cmp(&expected) {
            Ordering::Equal => Ok(None),
            Ordering::Less => Ok(Some(stored)),
            Ordering::Greater => Err(RepoError::UnsupportedVersion {
                stored,
                supported: expected,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_datastore::MemoryDatastore;

    fn store() -> (Arc<MemoryDatastore>, VersionStore) {
        let root = Arc::new(MemoryDatastore::new());
        let versions = VersionStore::new(root.clone());
        (root, versions)
    }

    #[test]
    fn missing_version_is_not_found() {
        let (_, versions) = store();
        assert!(!versions.exists().unwrap());
        assert!(versions.get().unwrap_err().is_not_found());
    }

    #[test]
    fn set_and_get() {
        let (root, versions) = store();
        versions.set(REPO_VERSION).unwrap();
        assert!(versions.exists().unwrap());
        assert_eq!(versions.get().unwrap(), REPO_VERSION);
        assert_eq!(
            root.get(&Key::from_static(VERSION_KEY)).unwrap().unwrap(),
            b"7"
        );
    }

    #[test]
    fn tolerates_trailing_newline() {
        let (root, versions) = store();
        root.put(&Key::from_static(VERSION_KEY), b"6\n").unwrap();
        assert_eq!(versions.get().unwrap(), 6);
    }

    #[test]
    fn garbage_is_invalid() {
        let (root, versions) = store();
        root.put(&Key::from_static(VERSION_KEY), b"seven").unwrap();
        assert!(matches!(versions.get(), Err(RepoError::InvalidVersion(v)) if v == "seven"));
    }

    #[test]
    fn check_compares_against_expected() {
        let (_, versions) = store();
        versions.set(5).unwrap();
        assert_eq!(versions.check(5).unwrap(), None);
        assert_eq!(versions.check(6).unwrap(), Some(5));
        assert!(matches!(
            versions.check(4),
            Err(RepoError::UnsupportedVersion { stored: 5, supported: 4 })
        ));
    }
}
