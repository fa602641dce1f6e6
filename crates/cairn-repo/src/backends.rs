//! The four storage namespaces a repository multiplexes.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use cairn_datastore::{Datastore, FsDatastore, MemoryDatastore};
use tracing::{debug, warn};

use crate::error::{RepoError, RepoResult};
use crate::options::{BackendKind, BackendsConfig};

/// File extension for values in every filesystem namespace.
pub const DATA_EXTENSION: &str = "data";

/// Logical namespace within a repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Root,
    Blocks,
    Keys,
    Datastore,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Root,
        Namespace::Blocks,
        Namespace::Keys,
        Namespace::Datastore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Root => "root",
            Namespace::Blocks => "blocks",
            Namespace::Keys => "keys",
            Namespace::Datastore => "datastore",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapter handles for every namespace.
///
/// Handles are shared: migrations and the public accessors get clones of the
/// same `Arc`s the repository holds.
#[derive(Clone, Debug)]
pub struct Backends {
    pub root: Arc<dyn Datastore>,
    pub blocks: Arc<dyn Datastore>,
    pub keys: Arc<dyn Datastore>,
    pub datastore: Arc<dyn Datastore>,
}

impl Backends {
    /// Build adapters for `path` according to `config`.
    ///
    /// Filesystem namespaces live in sibling directories below `path`. Every
    /// value file carries [`DATA_EXTENSION`] so a key and its descendants can
    /// coexist.
    pub fn from_config(path: &Path, config: &BackendsConfig) -> Self {
        let build = |kind: BackendKind, ns: Namespace| -> Arc<dyn Datastore> {
            match kind {
                BackendKind::Memory => Arc::new(MemoryDatastore::new()),
                BackendKind::Fs => Arc::new(
                    FsDatastore::new(path.join(ns.as_str())).with_extension(DATA_EXTENSION),
                ),
            }
        };
        Self {
            root: build(config.root, Namespace::Root),
            blocks: build(config.blocks, Namespace::Blocks),
            keys: build(config.keys, Namespace::Keys),
            datastore: build(config.datastore, Namespace::Datastore),
        }
    }

    /// Fresh memory adapters for every namespace.
    pub fn in_memory() -> Self {
        Self::from_config(Path::new(""), &BackendsConfig::all(BackendKind::Memory))
    }

    pub fn get(&self, ns: Namespace) -> &Arc<dyn Datastore> {
        match ns {
            Namespace::Root => &self.root,
            Namespace::Blocks => &self.blocks,
            Namespace::Keys => &self.keys,
            Namespace::Datastore => &self.datastore,
        }
    }

    /// Open every adapter. If one fails, the ones already opened are closed
    /// again before the error is returned.
    pub fn open_all(&self) -> RepoResult<()> {
        for (i, ns) in Namespace::ALL.iter().enumerate() {
            if let Err(e) = self.get(*ns).open() {
                for opened in &Namespace::ALL[..i] {
                    if let Err(close_err) = self.get(*opened).close() {
                        warn!(namespace = %opened, error = %close_err, "failed to close backend after open failure");
                    }
                }
                return Err(RepoError::backend("open", ns)(e));
            }
            debug!(namespace = %ns, "backend opened");
        }
        Ok(())
    }

    /// Close every adapter, even after a failure. Returns the first error.
    pub fn close_all(&self) -> RepoResult<()> {
        let mut first = None;
        for ns in Namespace::ALL {
            if let Err(e) = self.get(ns).close() {
                warn!(namespace = %ns, error = %e, "failed to close backend");
                first.get_or_insert(RepoError::backend("close", ns)(e));
            }
        }
        first.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_datastore::{DatastoreError, DatastoreResult, EntryIter};
    use cairn_types::Key;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store whose `open` fails, counting `close` calls.
    #[derive(Debug, Default)]
    struct Flaky {
        inner: MemoryDatastore,
        fail_open: bool,
        closes: AtomicUsize,
    }

    impl Datastore for Flaky {
        fn open(&self) -> DatastoreResult<()> {
            if self.fail_open {
                return Err(DatastoreError::Backend("open refused".into()));
            }
            Ok(())
        }

        fn close(&self) -> DatastoreResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn get(&self, key: &Key) -> DatastoreResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn put(&self, key: &Key, value: &[u8]) -> DatastoreResult<()> {
            self.inner.put(key, value)
        }

        fn delete(&self, key: &Key) -> DatastoreResult<bool> {
            self.inner.delete(key)
        }

        fn iter(&self, prefix: Option<&Key>) -> DatastoreResult<EntryIter<'_>> {
            self.inner.iter(prefix)
        }
    }

    #[test]
    fn fs_layout() {
        let dir = tempfile::tempdir().unwrap();
        let backends = Backends::from_config(dir.path(), &BackendsConfig::default());
        backends.open_all().unwrap();
        for ns in Namespace::ALL {
            assert!(dir.path().join(ns.as_str()).is_dir(), "{ns} directory missing");
        }

        let key = Key::new("/ABCD").unwrap();
        backends.blocks.put(&key, b"payload").unwrap();
        assert!(dir.path().join("blocks/ABCD.data").is_file());
        backends.root.put(&Key::new("/config").unwrap(), b"{}").unwrap();
        assert!(dir.path().join("root/config.data").is_file());
    }

    #[test]
    fn namespaces_are_separate() {
        let backends = Backends::in_memory();
        let key = Key::new("/shared").unwrap();
        backends.root.put(&key, b"root").unwrap();
        assert!(!backends.blocks.has(&key).unwrap());
        assert!(!backends.keys.has(&key).unwrap());
        assert!(!backends.datastore.has(&key).unwrap());
    }

    #[test]
    fn open_failure_rolls_back() {
        let root = Arc::new(Flaky::default());
        let blocks = Arc::new(Flaky::default());
        let keys = Arc::new(Flaky {
            fail_open: true,
            ..Default::default()
        });
        let backends = Backends {
            root: root.clone(),
            blocks: blocks.clone(),
            keys: keys.clone(),
            datastore: Arc::new(MemoryDatastore::new()),
        };

        let err = backends.open_all().unwrap_err();
        assert!(matches!(err, RepoError::Backend { op: "open", .. }));
        assert_eq!(root.closes.load(Ordering::SeqCst), 1);
        assert_eq!(blocks.closes.load(Ordering::SeqCst), 1);
        assert_eq!(keys.closes.load(Ordering::SeqCst), 0);
    }
}
