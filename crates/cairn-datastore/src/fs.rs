//! Filesystem-backed datastore.
//!
//! Each key maps to one file below the store root: `/a/b/c` is stored at
//! `<root>/a/b/c[.ext]`. Writes go to a temp file in the target directory and
//! are renamed into place, so readers never observe a partial value.
//!
//! Without an extension, a key and its descendants cannot coexist (`/a` would
//! be both a file and a directory); namespaces that nest keys should set one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cairn_types::Key;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{DatastoreError, DatastoreResult};
use crate::traits::{Datastore, Entry, EntryIter, KeyIter, Usage};

/// Prefix for in-flight temp files. Entries with this prefix are never
/// reported by iteration.
const TEMP_PREFIX: &str = ".cairn-tmp-";

/// One-file-per-key datastore rooted at a directory.
#[derive(Clone, Debug)]
pub struct FsDatastore {
    root: PathBuf,
    extension: Option<String>,
}

impl FsDatastore {
    /// Create a datastore rooted at `root`. Nothing is touched on disk until
    /// [`Datastore::open`] or the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: None,
        }
    }

    /// Store every value with the given file extension (without the dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path holding the value for `key`.
    pub fn key_path(&self, key: &Key) -> PathBuf {
        let mut path = self.dir_path(key);
        if let Some(ext) = &self.extension {
            let file_name = format!("{}.{ext}", key.name());
            path.set_file_name(file_name);
        }
        path
    }

    /// Directory that holds entries nested below `key`.
    fn dir_path(&self, key: &Key) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.segments() {
            path.push(segment);
        }
        path
    }

    /// Map a file below the root back to its key.
    ///
    /// Returns `Ok(None)` for files this store did not write (temp files,
    /// files without the configured extension).
    fn path_key(&self, path: &Path) -> DatastoreResult<Option<Key>> {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return Ok(None);
        };
        let mut segments: Vec<String> = Vec::new();
        for component in relative.components() {
            let Some(segment) = component.as_os_str().to_str() else {
                return Ok(None);
            };
            segments.push(segment.to_string());
        }
        let Some(last) = segments.last_mut() else {
            return Ok(None);
        };
        if last.starts_with(TEMP_PREFIX) {
            return Ok(None);
        }
        if let Some(ext) = &self.extension {
            let suffix = format!(".{ext}");
            match last.strip_suffix(&suffix) {
                Some(stem) if !stem.is_empty() => *last = stem.to_string(),
                _ => return Ok(None),
            }
        }
        Ok(Some(Key::from_segments(segments)?))
    }

    /// A directory at `path` holds descendants only and reads as absent.
    fn read_file(path: &Path) -> DatastoreResult<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound || path.is_dir() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Files at or below `prefix`, in file-name order.
    fn walk(&self, prefix: Option<&Key>) -> impl Iterator<Item = DatastoreResult<PathBuf>> + Send {
        let (exact, base) = match prefix {
            Some(key) => {
                let exact = self.key_path(key);
                (exact.is_file().then_some(exact), self.dir_path(key))
            }
            None => (None, self.root.clone()),
        };
        let nested = base
            .is_dir()
            .then(|| {
                WalkDir::new(base)
                    .min_depth(1)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|entry| match entry {
                        Ok(entry) if entry.file_type().is_file() => {
                            Some(Ok(entry.into_path()))
                        }
                        Ok(_) => None,
                        Err(e) => Some(Err(DatastoreError::Io(e.into()))),
                    })
            })
            .into_iter()
            .flatten();
        exact
            .map(Ok::<PathBuf, DatastoreError>)
            .into_iter()
            .chain(nested)
    }
}

impl Datastore for FsDatastore {
    fn open(&self) -> DatastoreResult<()> {
        fs::create_dir_all(&self.root)?;
        debug!(root = %self.root.display(), "fs datastore opened");
        Ok(())
    }

    fn get(&self, key: &Key) -> DatastoreResult<Option<Vec<u8>>> {
        Self::read_file(&self.key_path(key))
    }

    fn put(&self, key: &Key, value: &[u8]) -> DatastoreResult<()> {
        let path = self.key_path(key);
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(parent)?;
        temp.write_all(value)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| DatastoreError::Io(e.error))?;
        Ok(())
    }

    fn delete(&self, key: &Key) -> DatastoreResult<bool> {
        let path = self.key_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound || path.is_dir() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn has(&self, key: &Key) -> DatastoreResult<bool> {
        Ok(self.key_path(key).is_file())
    }

    fn iter(&self, prefix: Option<&Key>) -> DatastoreResult<EntryIter<'_>> {
        let entries = self.walk(prefix).filter_map(move |path| {
            let path = match path {
                Ok(path) => path,
                Err(e) => return Some(Err(e)),
            };
            let key = match self.path_key(&path) {
                Ok(Some(key)) => key,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            // A file removed between listing and reading is skipped.
            match Self::read_file(&path) {
                Ok(Some(value)) => Some(Ok(Entry { key, value })),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::new(entries))
    }

    fn keys(&self, prefix: Option<&Key>) -> DatastoreResult<KeyIter<'_>> {
        let keys = self
            .walk(prefix)
            .filter_map(move |path| match path {
                Ok(path) => self.path_key(&path).transpose(),
                Err(e) => Some(Err(e)),
            });
        Ok(Box::new(keys))
    }

    /// Sums file sizes from metadata without reading values.
    fn usage(&self) -> DatastoreResult<Usage> {
        let mut usage = Usage::default();
        for path in self.walk(None) {
            let path = path?;
            if self.path_key(&path)?.is_none() {
                continue;
            }
            let len = match fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            usage.entries += 1;
            usage.bytes += len;
        }
        Ok(usage)
    }
}
