use std::sync::Arc;

use cairn_datastore::Datastore;
use cairn_types::Key;
use tracing::debug;

use crate::error::{RepoError, RepoResult};

/// Root key holding the address of a running API server.
pub const API_KEY: &str = "/api";

/// Address advertised by a daemon while it serves this repository.
#[derive(Clone, Debug)]
pub struct ApiAddrStore {
    root: Arc<dyn Datastore>,
    key: Key,
}

impl ApiAddrStore {
    pub fn new(root: Arc<dyn Datastore>) -> Self {
        Self {
            root,
            key: Key::from_static(API_KEY),
        }
    }

    /// Fails with `NotFound` when no address is recorded.
    pub fn get(&self) -> RepoResult<String> {
        let raw = self
            .root
            .get(&self.key)
            .map_err(RepoError::backend("get", &self.key))?
            .ok_or_else(|| RepoError::NotFound(self.key.to_string()))?;
        Ok(String::from_utf8_lossy(&raw).trim().to_string())
    }

    pub fn set(&self, addr: &str) -> RepoResult<()> {
        self.root
            .put(&self.key, addr.as_bytes())
            .map_err(RepoError::backend("put", &self.key))?;
        debug!(addr, "api address recorded");
        Ok(())
    }

    /// Returns `true` if an address was recorded.
    pub fn delete(&self) -> RepoResult<bool> {
        self.root
            .delete(&self.key)
            .map_err(RepoError::backend("delete", &self.key))
    }
}
