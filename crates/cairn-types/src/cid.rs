use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::key::Key;

/// Opaque content identifier addressing a block.
///
/// A `Cid` is supplied by the caller; the repository never interprets its
/// bytes or checks them against the payload they address. Two blocks with
/// equal identifiers are assumed to carry identical content.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>")]
pub struct Cid(Vec<u8>);

impl Cid {
    /// Wrap caller-supplied identifier bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, TypeError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(TypeError::EmptyCid);
        }
        Ok(Self(bytes))
    }

    /// Derive an identifier from payload bytes (BLAKE3, 32 bytes).
    pub fn digest(data: &[u8]) -> Self {
        Self(blake3::hash(data).as_bytes().to_vec())
    }

    /// The raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..self.0.len().min(4)])
    }

    /// Parse from a hex string (either case).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_bytes(bytes)
    }

    /// Single-segment storage key: the uppercase hex of the identifier.
    pub fn to_key(&self) -> Key {
        // Hex of a non-empty identifier is always a valid segment.
        Key::from_trusted_segment(hex::encode_upper(&self.0))
    }

    /// Inverse of [`Cid::to_key`]. Returns `None` for keys this type did not produce.
    pub fn from_key(key: &Key) -> Option<Self> {
        if key.len() != 1 {
            return None;
        }
        Self::from_hex(key.name()).ok()
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.short_hex())
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<Vec<u8>> for Cid {
    type Error = TypeError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl FromStr for Cid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
