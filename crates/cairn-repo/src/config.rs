//! Configuration document store.
//!
//! The document is a JSON value kept under a single root key. Partial writes
//! address a node by dotted path (`Addresses.API`, `Bootstrap.0`) and run as
//! read-modify-write under the store's writer mutex, so two partial writes
//! through the same store never clobber each other.
//!
//! Path segments follow key segment rules, so an object member whose name
//! contains `.` or `/` cannot be addressed by path: `.` splits it and `/`
//! fails with `InvalidPath`. Such members are only reachable through
//! [`ConfigStore::get_all`] and [`ConfigStore::replace`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cairn_datastore::Datastore;
use cairn_types::Key;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{RepoError, RepoResult};

/// Root key holding the serialized document.
pub const CONFIG_KEY: &str = "/config";

#[derive(Debug)]
pub struct ConfigStore {
    root: Arc<dyn Datastore>,
    key: Key,
    writer: Mutex<()>,
}

impl ConfigStore {
    pub fn new(root: Arc<dyn Datastore>) -> Self {
        Self {
            root,
            key: Key::from_static(CONFIG_KEY),
            writer: Mutex::new(()),
        }
    }

    /// `true` once a document has been written.
    pub fn exists(&self) -> RepoResult<bool> {
        self.root
            .has(&self.key)
            .map_err(RepoError::backend("has", &self.key))
    }

    /// The whole document. Fails with `NotFound` if none was written.
    pub fn get_all(&self) -> RepoResult<Value> {
        self.load()?
            .ok_or_else(|| RepoError::NotFound(self.key.to_string()))
    }

    /// The value at a dotted `path`.
    pub fn get(&self, path: &str) -> RepoResult<Value> {
        let segments = parse_path(path)?;
        let document = self.get_all()?;
        lookup(&document, segments.segments())
            .cloned()
            .ok_or_else(|| RepoError::NotFound(path.to_string()))
    }

    /// Replace the whole document.
    pub fn replace(&self, document: &Value) -> RepoResult<()> {
        let _writer = self.lock_writer();
        self.store(document)
    }

    /// Set the value at a dotted `path`, creating intermediate objects.
    ///
    /// Siblings of the target are left untouched. Fails with `InvalidPath`
    /// if a prefix of `path` resolves to a scalar or an array index is out
    /// of bounds.
    pub fn set(&self, path: &str, value: Value) -> RepoResult<()> {
        let segments = parse_path(path)?;
        let _writer = self.lock_writer();
        let mut document = self.load()?.unwrap_or_else(|| Value::Object(Map::new()));
        set_at(&mut document, segments.segments(), value).map_err(|reason| {
            RepoError::InvalidPath {
                path: path.to_string(),
                reason,
            }
        })?;
        self.store(&document)?;
        debug!(path, "config value set");
        Ok(())
    }

    fn load(&self) -> RepoResult<Option<Value>> {
        let raw = self
            .root
            .get(&self.key)
            .map_err(RepoError::backend("get", &self.key))?;
        match raw {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn store(&self, document: &Value) -> RepoResult<()> {
        let bytes = serde_json::to_vec_pretty(document)?;
        self.root
            .put(&self.key, &bytes)
            .map_err(RepoError::backend("put", &self.key))
    }

    // The guarded data is `()`, so a poisoned writer carries no broken state.
    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_path(path: &str) -> RepoResult<Key> {
    Key::from_dotted(path).map_err(|e| RepoError::InvalidPath {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn lookup<'a>(document: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments.iter().try_fold(document, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn set_at(document: &mut Value, segments: &[String], value: Value) -> Result<(), String> {
    let Some((last, parents)) = segments.split_last() else {
        return Err("empty path".to_string());
    };

    let mut node = document;
    for (depth, segment) in parents.iter().enumerate() {
        node = match node {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => {
                let len = items.len();
                array_slot(items, segment)
                    .ok_or_else(|| format!("index {segment} out of bounds for array of length {len}"))?
            }
            _ => return Err(not_an_object(&parents[..depth])),
        };
    }

    match node {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let len = items.len();
            let slot = array_slot(items, last)
                .ok_or_else(|| format!("index {last} out of bounds for array of length {len}"))?;
            *slot = value;
            Ok(())
        }
        _ => Err(not_an_object(parents)),
    }
}

fn not_an_object(prefix: &[String]) -> String {
    if prefix.is_empty() {
        "document root is not an object".to_string()
    } else {
        format!("{} is not an object", prefix.join("."))
    }
}

fn array_slot<'a>(items: &'a mut [Value], segment: &str) -> Option<&'a mut Value> {
    segment.parse::<usize>().ok().and_then(move |i| items.get_mut(i))
}
