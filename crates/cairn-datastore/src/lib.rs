//! Pluggable key-value storage backends for cairn repositories.
//!
//! A repository multiplexes four independent namespaces (root, blocks, keys,
//! datastore). Each one is served by a [`Datastore`] implementation chosen at
//! construction time.
//!
//! # Storage Backends
//!
//! - [`MemoryDatastore`] -- `BTreeMap`-based store for tests and embedding
//! - [`FsDatastore`] -- one file per key under a directory, atomic replace on write
//!
//! # Design Rules
//!
//! 1. A datastore stores opaque bytes; it never interprets values.
//! 2. Absence is not an error: `get` returns `Ok(None)`.
//! 3. Readers never observe a partially written value.
//! 4. Iteration is lazy and finite; order is backend-defined.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod batch;
pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use batch::{Batch, BatchOp};
pub use error::{DatastoreError, DatastoreResult};
pub use fs::FsDatastore;
pub use memory::MemoryDatastore;
pub use traits::{Datastore, Entry, EntryIter, KeyIter, Usage};
