use std::fmt;

use cairn_types::Key;

use crate::batch::{Batch, BatchOp};
use crate::error::DatastoreResult;

/// A single key/value pair yielded by iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: Vec<u8>,
}

/// Lazy, finite, non-restartable sequence of entries.
pub type EntryIter<'a> = Box<dyn Iterator<Item = DatastoreResult<Entry>> + Send + 'a>;

/// Lazy, finite, non-restartable sequence of keys.
pub type KeyIter<'a> = Box<dyn Iterator<Item = DatastoreResult<Key>> + Send + 'a>;

/// Entry count and payload bytes held by a datastore.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    pub entries: u64,
    pub bytes: u64,
}

/// Key-value storage backend.
///
/// All implementations must satisfy these invariants:
/// - `put` replaces any existing value atomically: concurrent readers see
///   either the old value or the new one, never a mix.
/// - `get` and `has` report absence as `Ok`, never as an error.
/// - `delete` of a missing key is not an error.
/// - All I/O errors are propagated, never silently ignored.
/// - Reads (`get`, `has`, `iter`) work before [`Datastore::open`]; an
///   unopened store that holds nothing reports absence.
///
/// Retry policy, if any, belongs to the implementation.
pub trait Datastore: Send + Sync + fmt::Debug {
    /// Prepare the backend for use (create directories, open handles).
    ///
    /// Must be safe to call again after [`Datastore::close`].
    fn open(&self) -> DatastoreResult<()> {
        Ok(())
    }

    /// Flush pending state and release backend resources.
    fn close(&self) -> DatastoreResult<()> {
        Ok(())
    }

    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &Key) -> DatastoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any existing value.
    fn put(&self, key: &Key, value: &[u8]) -> DatastoreResult<()>;

    /// Remove `key`. Returns `true` if it existed.
    fn delete(&self, key: &Key) -> DatastoreResult<bool>;

    /// Iterate over all entries at or below `prefix` (all entries for `None`).
    fn iter(&self, prefix: Option<&Key>) -> DatastoreResult<EntryIter<'_>>;

    /// Check whether `key` exists.
    ///
    /// Default implementation reads the value. Backends should override
    /// when existence can be checked without a read.
    fn has(&self, key: &Key) -> DatastoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Iterate over keys at or below `prefix`.
    fn keys(&self, prefix: Option<&Key>) -> DatastoreResult<KeyIter<'_>> {
        let entries = self.iter(prefix)?;
        Ok(Box::new(entries.map(|entry| entry.map(|e| e.key))))
    }

    /// Store a lazily produced sequence of entries, stopping at the first error.
    ///
    /// Returns the number of entries written. The sequence is consumed one
    /// entry at a time and never collected.
    fn put_many(&self, entries: &mut dyn Iterator<Item = Entry>) -> DatastoreResult<u64> {
        let mut written = 0;
        for entry in entries {
            self.put(&entry.key, &entry.value)?;
            written += 1;
        }
        Ok(written)
    }

    /// Apply a batch of queued writes.
    ///
    /// Default implementation applies operations in order. Backends may
    /// override to apply the batch atomically.
    fn commit(&self, batch: Batch) -> DatastoreResult<()> {
        for op in batch {
            match op {
                BatchOp::Put { key, value } => self.put(&key, &value)?,
                BatchOp::Delete { key } => {
                    self.delete(&key)?;
                }
            }
        }
        Ok(())
    }

    /// Count entries and payload bytes.
    ///
    /// Default implementation iterates every entry.
    fn usage(&self) -> DatastoreResult<Usage> {
        let mut usage = Usage::default();
        for entry in self.iter(None)? {
            let entry = entry?;
            usage.entries += 1;
            usage.bytes += entry.value.len() as u64;
        }
        Ok(usage)
    }
}
