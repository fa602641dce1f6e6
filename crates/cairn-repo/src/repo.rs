use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use cairn_datastore::Datastore;
use cairn_lock::{FsLock, LockHandle, MemoryLock, RepoLock};
use cairn_types::{Cid, Key};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api_addr::ApiAddrStore;
use crate::backends::Backends;
use crate::blocks::{Block, BlockStore};
use crate::config::ConfigStore;
use crate::error::{RepoError, RepoResult};
use crate::migration::Migrations;
use crate::options::{LockKind, RepoOptions};
use crate::stat::RepoStat;
use crate::version::{VersionStore, REPO_VERSION};

/// Lock handle of an open repository; `None` while closed.
type OpenState = Option<LockHandle>;

/// A content-addressed repository at one storage location.
///
/// Lifecycle: [`Repo::init`] once, then [`Repo::open`] before any data
/// access and [`Repo::close`] when done. Every data operation fails with
/// [`RepoError::Closed`] unless the repository is open. Open state is per
/// instance; the repository lock keeps a second instance at the same
/// location from opening concurrently.
///
/// Data operations hold a shared guard on the open state for their
/// duration, so `close` waits for in-flight operations to finish.
pub struct Repo {
    path: PathBuf,
    options: RepoOptions,
    backends: Backends,
    lock: Arc<dyn RepoLock>,
    migrations: Migrations,
    state: RwLock<OpenState>,
    config: ConfigStore,
    version: VersionStore,
    blocks: BlockStore,
    api_addr: ApiAddrStore,
}

impl Repo {
    /// Repository at `path` with default options.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::builder(path).build()
    }

    pub fn with_options(path: impl Into<PathBuf>, options: RepoOptions) -> Self {
        Self::builder(path).options(options).build()
    }

    pub fn builder(path: impl Into<PathBuf>) -> RepoBuilder {
        RepoBuilder::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &RepoOptions {
        &self.options
    }

    /// `true` unless this instance is open.
    pub fn closed(&self) -> bool {
        self.read_state().is_none()
    }

    // ---- Lifecycle ----

    /// Create the repository with `config` as its initial document.
    ///
    /// Holds the repository lock for the duration. Fails with
    /// `AlreadyInitialized` if a config and version are already present,
    /// checked before the lock so an initialized repository held open
    /// elsewhere is reported as initialized rather than `Locked`.
    /// The version is written last; a repository whose init was interrupted
    /// is not considered initialized and can be initialized again.
    pub fn init(&self, config: &Value) -> RepoResult<()> {
        let state = self.write_state();
        if state.is_some() || self.is_initialized()? {
            return Err(RepoError::AlreadyInitialized(self.path.clone()));
        }

        let mut handle = self.lock.acquire(&self.path)?;
        let result = self.init_locked(config);
        let released = handle.release().map_err(RepoError::from);
        result.and(released)?;

        info!(path = %self.path.display(), version = REPO_VERSION, "repository initialized");
        Ok(())
    }

    fn init_locked(&self, config: &Value) -> RepoResult<()> {
        // Another instance may have finished init while we waited.
        if self.is_initialized()? {
            return Err(RepoError::AlreadyInitialized(self.path.clone()));
        }
        self.backends.open_all()?;
        let written = self
            .config
            .replace(config)
            .and_then(|()| self.version.set(REPO_VERSION));
        let closed = self.backends.close_all();
        written.and(closed)
    }

    /// `true` once both the config document and the version marker exist.
    ///
    /// Reads the root namespace without opening it or taking the lock.
    pub fn is_initialized(&self) -> RepoResult<bool> {
        Ok(self.config.exists()? && self.version.exists()?)
    }

    /// Same as [`Repo::is_initialized`].
    pub fn exists(&self) -> RepoResult<bool> {
        self.is_initialized()
    }

    /// Acquire the lock, open every backend and check the schema version.
    ///
    /// An older stored version is migrated when `auto_migrate` is set and a
    /// registered step covers every version up to [`REPO_VERSION`];
    /// otherwise `open` fails with `VersionMismatch`. A newer stored version
    /// fails with `UnsupportedVersion`. On any failure the backends are
    /// closed again and the lock is released.
    pub fn open(&self) -> RepoResult<()> {
        let mut state = self.write_state();
        if state.is_some() {
            return Err(RepoError::AlreadyOpen);
        }
        if !self.is_initialized()? {
            return Err(RepoError::NotInitialized(self.path.clone()));
        }

        let mut handle = self.lock.acquire(&self.path)?;
        if let Err(e) = self.open_locked() {
            if let Err(release_err) = handle.release() {
                warn!(path = %self.path.display(), error = %release_err, "failed to release lock after open failure");
            }
            return Err(e);
        }

        *state = Some(handle);
        info!(path = %self.path.display(), "repository opened");
        Ok(())
    }

    fn open_locked(&self) -> RepoResult<()> {
        self.backends.open_all()?;
        let checked = self.check_version();
        if checked.is_err() {
            if let Err(e) = self.backends.close_all() {
                warn!(path = %self.path.display(), error = %e, "failed to close backends after open failure");
            }
        }
        checked
    }

    fn check_version(&self) -> RepoResult<()> {
        let Some(stored) = self.version.check(REPO_VERSION)? else {
            return Ok(());
        };
        if !self.options.auto_migrate || !self.migrations.can_migrate(stored, REPO_VERSION) {
            return Err(RepoError::VersionMismatch {
                stored,
                expected: REPO_VERSION,
            });
        }
        info!(from = stored, to = REPO_VERSION, "migrating repository");
        self.migrations.run(&self.backends, &self.version, REPO_VERSION)
    }

    /// Close every backend and release the lock. No-op when closed.
    ///
    /// The instance ends up closed even if a backend or the lock fails to
    /// release; the first such error is returned.
    pub fn close(&self) -> RepoResult<()> {
        let mut state = self.write_state();
        let Some(mut handle) = state.take() else {
            debug!(path = %self.path.display(), "close on closed repository");
            return Ok(());
        };
        let closed = self.backends.close_all();
        let released = handle.release().map_err(RepoError::from);
        info!(path = %self.path.display(), "repository closed");
        closed.and(released)
    }

    // ---- Root namespace ----

    pub fn put(&self, key: &Key, value: &[u8]) -> RepoResult<()> {
        let _open = self.guard()?;
        self.backends
            .root
            .put(key, value)
            .map_err(RepoError::backend("put", key))
    }

    /// Value under `key`. Fails with `NotFound` if absent.
    pub fn get(&self, key: &Key) -> RepoResult<Vec<u8>> {
        let _open = self.guard()?;
        self.backends
            .root
            .get(key)
            .map_err(RepoError::backend("get", key))?
            .ok_or_else(|| RepoError::NotFound(key.to_string()))
    }

    pub fn has(&self, key: &Key) -> RepoResult<bool> {
        let _open = self.guard()?;
        self.backends
            .root
            .has(key)
            .map_err(RepoError::backend("has", key))
    }

    /// Returns `true` if `key` existed.
    pub fn delete(&self, key: &Key) -> RepoResult<bool> {
        let _open = self.guard()?;
        self.backends
            .root
            .delete(key)
            .map_err(RepoError::backend("delete", key))
    }

    // ---- Sub-stores ----

    /// Encrypted key namespace. Contents are opaque to the repository.
    pub fn keys(&self) -> RepoResult<Arc<dyn Datastore>> {
        let _open = self.guard()?;
        Ok(Arc::clone(&self.backends.keys))
    }

    /// General-purpose datastore namespace.
    pub fn datastore(&self) -> RepoResult<Arc<dyn Datastore>> {
        let _open = self.guard()?;
        Ok(Arc::clone(&self.backends.datastore))
    }

    pub fn config(&self) -> ConfigView<'_> {
        ConfigView { repo: self }
    }

    pub fn version(&self) -> VersionView<'_> {
        VersionView { repo: self }
    }

    pub fn blocks(&self) -> BlocksView<'_> {
        BlocksView { repo: self }
    }

    pub fn api_addr(&self) -> ApiAddrView<'_> {
        ApiAddrView { repo: self }
    }

    /// Usage across all namespaces. Read-only and best-effort.
    pub fn stat(&self) -> RepoResult<RepoStat> {
        let _open = self.guard()?;
        Ok(RepoStat::collect(
            &self.path,
            &self.backends,
            &self.version,
            &self.config,
        ))
    }

    // ---- State ----

    /// Shared guard on the open state; fails with `Closed` if not open.
    fn guard(&self) -> RepoResult<RwLockReadGuard<'_, OpenState>> {
        let state = self.read_state();
        if state.is_none() {
            return Err(RepoError::Closed);
        }
        Ok(state)
    }

    // A panic while holding the state cannot leave it half-written: every
    // writer replaces the whole `Option` in one assignment.
    fn read_state(&self) -> RwLockReadGuard<'_, OpenState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, OpenState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Repo {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "failed to close repository on drop");
        }
    }
}

impl fmt::Debug for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repo")
            .field("path", &self.path)
            .field("closed", &self.closed())
            .field("options", &self.options)
            .finish()
    }
}

/// Configuration document of an open repository.
#[derive(Clone, Copy, Debug)]
pub struct ConfigView<'a> {
    repo: &'a Repo,
}

impl ConfigView<'_> {
    pub fn exists(&self) -> RepoResult<bool> {
        let _open = self.repo.guard()?;
        self.repo.config.exists()
    }

    pub fn get_all(&self) -> RepoResult<Value> {
        let _open = self.repo.guard()?;
        self.repo.config.get_all()
    }

    /// Value at a dotted path such as `Addresses.API`.
    pub fn get(&self, path: &str) -> RepoResult<Value> {
        let _open = self.repo.guard()?;
        self.repo.config.get(path)
    }

    /// Set the value at a dotted path, leaving siblings untouched.
    pub fn set(&self, path: &str, value: Value) -> RepoResult<()> {
        let _open = self.repo.guard()?;
        self.repo.config.set(path, value)
    }

    pub fn replace(&self, document: &Value) -> RepoResult<()> {
        let _open = self.repo.guard()?;
        self.repo.config.replace(document)
    }
}

/// Schema version marker of an open repository.
#[derive(Clone, Copy, Debug)]
pub struct VersionView<'a> {
    repo: &'a Repo,
}

impl VersionView<'_> {
    pub fn exists(&self) -> RepoResult<bool> {
        let _open = self.repo.guard()?;
        self.repo.version.exists()
    }

    pub fn get(&self) -> RepoResult<u64> {
        let _open = self.repo.guard()?;
        self.repo.version.get()
    }

    pub fn set(&self, version: u64) -> RepoResult<()> {
        let _open = self.repo.guard()?;
        self.repo.version.set(version)
    }

    /// `true` if the stored version equals [`REPO_VERSION`].
    pub fn is_current(&self) -> RepoResult<bool> {
        let _open = self.repo.guard()?;
        Ok(self.repo.version.check(REPO_VERSION)?.is_none())
    }
}

/// Block store of an open repository.
#[derive(Clone, Copy, Debug)]
pub struct BlocksView<'a> {
    repo: &'a Repo,
}

impl<'a> BlocksView<'a> {
    pub fn put(&self, block: &Block) -> RepoResult<()> {
        let _open = self.repo.guard()?;
        self.repo.blocks.put(block)
    }

    /// Store a lazy sequence of blocks. `close` waits until the sequence is
    /// drained or a block fails.
    ///
    /// The open state stays read-locked while `blocks` is pulled, so the
    /// sequence must not call `init`, `open` or `close` on this repository;
    /// doing so from the same thread deadlocks.
    pub fn put_many<I>(&self, blocks: I) -> RepoResult<usize>
    where
        I: IntoIterator<Item = Block>,
    {
        let _open = self.repo.guard()?;
        self.repo.blocks.put_many(blocks)
    }

    pub fn get(&self, cid: &Cid) -> RepoResult<Bytes> {
        let _open = self.repo.guard()?;
        self.repo.blocks.get(cid)
    }

    /// Fetch blocks lazily. Each item checks that the repository is still
    /// open.
    pub fn get_many<I>(&self, cids: I) -> impl Iterator<Item = RepoResult<Block>> + 'a
    where
        I: IntoIterator<Item = Cid>,
        I::IntoIter: 'a,
    {
        let repo = self.repo;
        cids.into_iter().map(move |cid| -> RepoResult<Block> {
            let _open = repo.guard()?;
            let data = repo.blocks.get(&cid)?;
            Ok(Block::new(cid, data))
        })
    }

    pub fn has(&self, cid: &Cid) -> RepoResult<bool> {
        let _open = self.repo.guard()?;
        self.repo.blocks.has(cid)
    }

    pub fn delete(&self, cid: &Cid) -> RepoResult<bool> {
        let _open = self.repo.guard()?;
        self.repo.blocks.delete(cid)
    }

    /// Identifiers of every stored block.
    pub fn cids(&self) -> RepoResult<impl Iterator<Item = RepoResult<Cid>> + 'a> {
        let _open = self.repo.guard()?;
        self.repo.blocks.cids()
    }
}

/// API server address of an open repository.
#[derive(Clone, Copy, Debug)]
pub struct ApiAddrView<'a> {
    repo: &'a Repo,
}

impl ApiAddrView<'_> {
    pub fn get(&self) -> RepoResult<String> {
        let _open = self.repo.guard()?;
        self.repo.api_addr.get()
    }

    pub fn set(&self, addr: &str) -> RepoResult<()> {
        let _open = self.repo.guard()?;
        self.repo.api_addr.set(addr)
    }

    pub fn delete(&self) -> RepoResult<bool> {
        let _open = self.repo.guard()?;
        self.repo.api_addr.delete()
    }
}

/// Builder for a [`Repo`] with injected adapters, lock or migrations.
///
/// Injected adapters replace the ones `options.backends` would select.
pub struct RepoBuilder {
    path: PathBuf,
    options: RepoOptions,
    root: Option<Arc<dyn Datastore>>,
    blocks: Option<Arc<dyn Datastore>>,
    keys: Option<Arc<dyn Datastore>>,
    datastore: Option<Arc<dyn Datastore>>,
    lock: Option<Arc<dyn RepoLock>>,
    migrations: Migrations,
}

impl RepoBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: RepoOptions::default(),
            root: None,
            blocks: None,
            keys: None,
            datastore: None,
            lock: None,
            migrations: Migrations::new(),
        }
    }

    pub fn options(mut self, options: RepoOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root(mut self, store: Arc<dyn Datastore>) -> Self {
        self.root = Some(store);
        self
    }

    pub fn blocks(mut self, store: Arc<dyn Datastore>) -> Self {
        self.blocks = Some(store);
        self
    }

    pub fn keys(mut self, store: Arc<dyn Datastore>) -> Self {
        self.keys = Some(store);
        self
    }

    pub fn datastore(mut self, store: Arc<dyn Datastore>) -> Self {
        self.datastore = Some(store);
        self
    }

    pub fn lock(mut self, lock: Arc<dyn RepoLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn migrations(mut self, migrations: Migrations) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn build(self) -> Repo {
        let defaults = Backends::from_config(&self.path, &self.options.backends);
        let backends = Backends {
            root: self.root.unwrap_or(defaults.root),
            blocks: self.blocks.unwrap_or(defaults.blocks),
            keys: self.keys.unwrap_or(defaults.keys),
            datastore: self.datastore.unwrap_or(defaults.datastore),
        };
        let lock: Arc<dyn RepoLock> = match self.lock {
            Some(lock) => lock,
            None => match self.options.lock {
                LockKind::Fs => Arc::new(FsLock::new()),
                LockKind::Memory => Arc::new(MemoryLock::new()),
            },
        };

        debug!(path = %self.path.display(), options = ?self.options, "repository configured");
        Repo {
            config: ConfigStore::new(Arc::clone(&backends.root)),
            version: VersionStore::new(Arc::clone(&backends.root)),
            blocks: BlockStore::new(Arc::clone(&backends.blocks)),
            api_addr: ApiAddrStore::new(Arc::clone(&backends.root)),
            path: self.path,
            options: self.options,
            backends,
            lock,
            migrations: self.migrations,
            state: RwLock::new(None),
        }
    }
}

impl fmt::Debug for RepoBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoBuilder")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("migrations", &self.migrations)
            .finish_non_exhaustive()
    }
}
