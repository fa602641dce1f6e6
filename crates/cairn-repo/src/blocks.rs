//! Content-addressed block storage.

use std::sync::Arc;

use bytes::Bytes;
use cairn_datastore::Datastore;
use cairn_types::Cid;
use tracing::debug;

use crate::error::{RepoError, RepoResult};

/// An identifier and its payload.
///
/// The store never checks that `data` hashes to `cid`; identifiers are
/// trusted as supplied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    cid: Cid,
    data: Bytes,
}

impl Block {
    pub fn new(cid: Cid, data: impl Into<Bytes>) -> Self {
        Self {
            cid,
            data: data.into(),
        }
    }

    /// Build a block addressed by the BLAKE3 digest of `data`.
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            cid: Cid::digest(&data),
            data,
        }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_parts(self) -> (Cid, Bytes) {
        (self.cid, self.data)
    }
}

/// Blocks keyed by identifier in the blocks namespace.
#[derive(Clone, Debug)]
pub struct BlockStore {
    blocks: Arc<dyn Datastore>,
}

impl BlockStore {
    pub fn new(blocks: Arc<dyn Datastore>) -> Self {
        Self { blocks }
    }

    /// Store a block. Re-putting an identifier overwrites its payload.
    pub fn put(&self, block: &Block) -> RepoResult<()> {
        self.blocks
            .put(&block.cid.to_key(), &block.data)
            .map_err(RepoError::backend("put", &block.cid))
    }

    /// Store blocks from a lazy sequence, one at a time.
    ///
    /// Stops at the first failure and returns [`RepoError::PutMany`] listing
    /// every identifier stored before it. Returns the number of blocks stored.
    pub fn put_many<I>(&self, blocks: I) -> RepoResult<usize>
    where
        I: IntoIterator<Item = Block>,
    {
        let mut stored = Vec::new();
        for block in blocks {
            if let Err(e) = self.put(&block) {
                return Err(RepoError::PutMany {
                    stored,
                    failed: block.cid,
                    source: Box::new(e),
                });
            }
            stored.push(block.cid);
        }
        debug!(count = stored.len(), "stored blocks");
        Ok(stored.len())
    }

    /// Payload for `cid`. Fails with `NotFound` if absent.
    pub fn get(&self, cid: &Cid) -> RepoResult<Bytes> {
        self.blocks
            .get(&cid.to_key())
            .map_err(RepoError::backend("get", cid))?
            .map(Bytes::from)
            .ok_or_else(|| RepoError::NotFound(cid.to_string()))
    }

    /// Lazily fetch each identifier in turn.
    pub fn get_many<'a, I>(&'a self, cids: I) -> impl Iterator<Item = RepoResult<Block>> + 'a
    where
        I: IntoIterator<Item = Cid>,
        I::IntoIter: 'a,
    {
        cids.into_iter()
            .map(move |cid| self.get(&cid).map(|data| Block::new(cid, data)))
    }

    pub fn has(&self, cid: &Cid) -> RepoResult<bool> {
        self.blocks
            .has(&cid.to_key())
            .map_err(RepoError::backend("has", cid))
    }

    /// Remove a block. Returns `true` if it existed.
    pub fn delete(&self, cid: &Cid) -> RepoResult<bool> {
        self.blocks
            .delete(&cid.to_key())
            .map_err(RepoError::backend("delete", cid))
    }

    /// Identifiers of every stored block. Entries whose key is not a valid
    /// identifier are skipped.
    pub fn cids(&self) -> RepoResult<impl Iterator<Item = RepoResult<Cid>> + '_> {
        let keys = self
            .blocks
            .keys(None)
            .map_err(RepoError::backend("iter", "blocks"))?;
        Ok(keys.filter_map(|key| match key {
            Ok(key) => Cid::from_key(&key).map(Ok),
            Err(e) => Some(Err(RepoError::backend("iter", "blocks")(e))),
        }))
    }
}
