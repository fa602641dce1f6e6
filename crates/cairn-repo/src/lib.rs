//! Content-addressed repository manager.
//!
//! A [`Repo`] multiplexes four storage namespaces behind one lifecycle:
//!
//! - **root** -- small named entries: the config document (`/config`), the
//!   schema version (`/version`) and the API address (`/api`)
//! - **blocks** -- opaque payloads addressed by [`Cid`](cairn_types::Cid)
//! - **keys** -- encrypted key material, opaque to the repository
//! - **datastore** -- general-purpose entries for higher layers
//!
//! ```no_run
//! use cairn_repo::{Block, Repo};
//! use serde_json::json;
//!
//! # fn main() -> cairn_repo::RepoResult<()> {
//! let repo = Repo::new("/tmp/cairn");
//! if !repo.exists()? {
//!     repo.init(&json!({"Addresses": {"API": "/ip4/127.0.0.1/tcp/5001"}}))?;
//! }
//! repo.open()?;
//! let block = Block::from_data(&b"hello"[..]);
//! repo.blocks().put(&block)?;
//! repo.config().set("Datastore.StorageMax", json!("10GB"))?;
//! repo.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Design Rules
//!
//! 1. `init` precedes `open`; `open` precedes every data operation.
//! 2. Lifecycle preconditions fail fast, before any backend is touched.
//! 3. At most one open instance per location, enforced by the repository lock.
//! 4. The version written by a newer build is never opened or downgraded.
//! 5. Backend failures surface with operation and key context, never retried.

pub mod api_addr;
pub mod backends;
pub mod blocks;
pub mod config;
pub mod error;
pub mod migration;
pub mod options;
pub mod repo;
pub mod stat;
pub mod version;

pub use api_addr::ApiAddrStore;
pub use backends::{Backends, Namespace};
pub use blocks::{Block, BlockStore};
pub use config::ConfigStore;
pub use error::{MigrationFailure, RepoError, RepoResult};
pub use migration::{Migration, Migrations};
pub use options::{BackendKind, BackendsConfig, LockKind, RepoOptions};
pub use repo::{ApiAddrView, BlocksView, ConfigView, Repo, RepoBuilder, VersionView};
pub use stat::{parse_byte_size, NamespaceStat, NamespaceStats, RepoStat};
pub use version::{VersionStore, REPO_VERSION};
