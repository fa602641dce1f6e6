use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cairn_types::Key;

use crate::batch::{Batch, BatchOp};
use crate::error::{DatastoreError, DatastoreResult};
use crate::traits::{Datastore, Entry, EntryIter, Usage};

/// In-memory, `BTreeMap`-based datastore.
///
/// Intended for tests and embedding. Entries live behind a `RwLock` and are
/// cloned on read. Iteration walks a snapshot in key order, so writes made
/// during iteration are not observed. Data is lost when the store is dropped.
pub struct MemoryDatastore {
    entries: RwLock<BTreeMap<Key, Vec<u8>>>,
}

impl MemoryDatastore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.read().map(|map| map.len()).unwrap_or_default()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> DatastoreResult<RwLockReadGuard<'_, BTreeMap<Key, Vec<u8>>>> {
        self.entries
            .read()
            .map_err(|e| DatastoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> DatastoreResult<RwLockWriteGuard<'_, BTreeMap<Key, Vec<u8>>>> {
        self.entries
            .write()
            .map_err(|e| DatastoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl Datastore for MemoryDatastore {
    fn get(&self, key: &Key) -> DatastoreResult<Option<Vec<u8>>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn put(&self, key: &Key, value: &[u8]) -> DatastoreResult<()> {
        self.write()?.insert(key.clone(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &Key) -> DatastoreResult<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    fn has(&self, key: &Key) -> DatastoreResult<bool> {
        Ok(self.read()?.contains_key(key))
    }

    fn iter(&self, prefix: Option<&Key>) -> DatastoreResult<EntryIter<'_>> {
        let map = self.read()?;
        let snapshot: Vec<Entry> = map
            .iter()
            .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)))
            .map(|(key, value)| Entry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        Ok(Box::new(snapshot.into_iter().map(Ok::<Entry, DatastoreError>)))
    }

    /// Applies the whole batch under a single write lock.
    fn commit(&self, batch: Batch) -> DatastoreResult<()> {
        let mut map = self.write()?;
        for op in batch {
            match op {
                BatchOp::Put { key, value } => {
                    map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn usage(&self) -> DatastoreResult<Usage> {
        let map = self.read()?;
        Ok(Usage {
            entries: map.len() as u64,
            bytes: map.values().map(|v| v.len() as u64).sum(),
        })
    }
}

impl std::fmt::Debug for MemoryDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDatastore")
            .field("entry_count", &self.len())
            .finish()
    }
}
