//! Foundation types for cairn repositories.
//!
//! Every other cairn crate depends on `cairn-types`.
//!
//! # Key Types
//!
//! - [`Key`] -- Structured, path-like identifier for root and config addressing
//! - [`Cid`] -- Opaque content identifier addressing a block

pub mod cid;
pub mod error;
pub mod key;

pub use cid::Cid;
pub use error::TypeError;
pub use key::Key;
