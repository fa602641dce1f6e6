//! Usage statistics across namespaces.
//!
//! Collection is best-effort: a namespace or marker that cannot be read
//! leaves its field `None` and logs a warning instead of failing the call.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use cairn_datastore::Usage;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::backends::{Backends, Namespace};
use crate::config::ConfigStore;
use crate::version::VersionStore;

/// Config path holding the storage quota, e.g. `"10GB"`.
pub const STORAGE_MAX_PATH: &str = "Datastore.StorageMax";

/// Entry count and payload bytes of one namespace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceStat {
    pub entries: u64,
    pub bytes: u64,
}

impl From<Usage> for NamespaceStat {
    fn from(usage: Usage) -> Self {
        Self {
            entries: usage.entries,
            bytes: usage.bytes,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceStats {
    pub root: Option<NamespaceStat>,
    pub blocks: Option<NamespaceStat>,
    pub keys: Option<NamespaceStat>,
    pub datastore: Option<NamespaceStat>,
}

impl NamespaceStats {
    fn slot(&mut self, ns: Namespace) -> &mut Option<NamespaceStat> {
        match ns {
            Namespace::Root => &mut self.root,
            Namespace::Blocks => &mut self.blocks,
            Namespace::Keys => &mut self.keys,
            Namespace::Datastore => &mut self.datastore,
        }
    }

    fn all(&self) -> [Option<NamespaceStat>; 4] {
        [self.root, self.blocks, self.keys, self.datastore]
    }
}

/// Snapshot returned by `Repo::stat`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RepoStat {
    pub repo_path: PathBuf,
    pub version: Option<u64>,
    /// Number of stored blocks.
    pub num_objects: Option<u64>,
    /// Bytes across all namespaces; `None` if any namespace failed.
    pub repo_size: Option<u64>,
    /// Configured quota in bytes.
    pub storage_max: Option<u64>,
    pub namespaces: NamespaceStats,
}

impl RepoStat {
    pub(crate) fn collect(
        path: &Path,
        backends: &Backends,
        version: &VersionStore,
        config: &ConfigStore,
    ) -> Self {
        let mut namespaces = NamespaceStats::default();
        for ns in Namespace::ALL {
            *namespaces.slot(ns) = degrade(ns, backends.get(ns).usage()).map(NamespaceStat::from);
        }

        let repo_size = namespaces
            .all()
            .iter()
            .try_fold(0u64, |total, stat| stat.map(|s| total.saturating_add(s.bytes)));

        let storage_max = match config.get(STORAGE_MAX_PATH) {
            Ok(value) => storage_max_from(&value),
            Err(e) if e.is_not_found() => None,
            Err(e) => degrade(STORAGE_MAX_PATH, Err::<u64, _>(e)),
        };

        Self {
            repo_path: path.to_path_buf(),
            version: degrade("version", version.get()),
            num_objects: namespaces.blocks.map(|s| s.entries),
            repo_size,
            storage_max,
            namespaces,
        }
    }
}

fn degrade<T, E: Display>(field: impl Display, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(field = %field, error = %e, "stat field unavailable");
            None
        }
    }
}

fn storage_max_from(value: &Value) -> Option<u64> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_byte_size(s),
        _ => None,
    };
    if parsed.is_none() {
        warn!(value = %value, "unrecognised {STORAGE_MAX_PATH}");
    }
    parsed
}

/// Parse a humanized size such as `10GB`, `512 MiB` or `1.5T`.
///
/// Units are binary multiples regardless of the `i`: `1KB` is 1024 bytes.
pub fn parse_byte_size(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let number: f64 = number.parse().ok()?;
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1 << 10,
        "M" | "MB" | "MIB" => 1 << 20,
        "G" | "GB" | "GIB" => 1 << 30,
        "T" | "TB" | "TIB" => 1 << 40,
        "P" | "PB" | "PIB" => 1 << 50,
        _ => return None,
    };
    let bytes = number * multiplier as f64;
    (bytes.is_finite() && bytes <= u64::MAX as f64).then_some(bytes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_datastore::{Datastore, DatastoreError, DatastoreResult, EntryIter, MemoryDatastore};
    use cairn_types::Key;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn byte_sizes() {
        assert_eq!(parse_byte_size("10GB"), Some(10 << 30));
        assert_eq!(parse_byte_size("512 MiB"), Some(512 << 20));
        assert_eq!(parse_byte_size("1.5K"), Some(1536));
        assert_eq!(parse_byte_size("42"), Some(42));
        assert_eq!(parse_byte_size("7b"), Some(7));
        assert_eq!(parse_byte_size("-1GB"), None);
        assert_eq!(parse_byte_size("ten GB"), None);
        assert_eq!(parse_byte_size("10XB"), None);
    }

    /// Backend whose `usage` always fails.
    #[derive(Debug, Default)]
    struct Unmeasurable(MemoryDatastore);

    impl Datastore for Unmeasurable {
        fn get(&self, key: &Key) -> DatastoreResult<Option<Vec<u8>>> {
            self.0.get(key)
        }

        fn put(&self, key: &Key, value: &[u8]) -> DatastoreResult<()> {
            self.0.put(key, value)
        }

        fn delete(&self, key: &Key) -> DatastoreResult<bool> {
            self.0.delete(key)
        }

        fn iter(&self, _prefix: Option<&Key>) -> DatastoreResult<EntryIter<'_>> {
            Err(DatastoreError::Backend("index unavailable".into()))
        }
    }

    fn fixture(keys: Arc<dyn Datastore>) -> (Backends, VersionStore, ConfigStore) {
        let mut backends = Backends::in_memory();
        backends.keys = keys;
        let version = VersionStore::new(backends.root.clone());
        let config = ConfigStore::new(backends.root.clone());
        (backends, version, config)
    }

    #[test]
    fn collects_every_field() {
        let (backends, version, config) = fixture(Arc::new(MemoryDatastore::new()));
        version.set(7).unwrap();
        config.replace(&json!({"Datastore": {"StorageMax": "1GB"}})).unwrap();
        backends.blocks.put(&Key::new("/B1").unwrap(), b"1234").unwrap();
        backends.blocks.put(&Key::new("/B2").unwrap(), b"56").unwrap();

        let stat = RepoStat::collect(Path::new("/repo"), &backends, &version, &config);
        assert_eq!(stat.repo_path, PathBuf::from("/repo"));
        assert_eq!(stat.version, Some(7));
        assert_eq!(stat.num_objects, Some(2));
        assert_eq!(stat.storage_max, Some(1 << 30));
        assert_eq!(stat.namespaces.blocks, Some(NamespaceStat { entries: 2, bytes: 6 }));

        let root_bytes = stat.namespaces.root.unwrap().bytes;
        assert_eq!(stat.repo_size, Some(root_bytes + 6));
    }

    #[test]
    fn failing_namespace_degrades_fields() {
        let (backends, version, config) = fixture(Arc::new(Unmeasurable::default()));
        let stat = RepoStat::collect(Path::new("/repo"), &backends, &version, &config);

        assert_eq!(stat.namespaces.keys, None);
        assert!(stat.namespaces.blocks.is_some());
        assert_eq!(stat.repo_size, None);
        assert_eq!(stat.num_objects, Some(0));
        // No version or config written: absent rather than an error.
        assert_eq!(stat.version, None);
        assert_eq!(stat.storage_max, None);
    }
}
