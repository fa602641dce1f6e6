//! Structured, path-like keys.
//!
//! A [`Key`] is an ordered, non-empty sequence of string segments. The
//! canonical text form joins segments with `/` behind a leading slash
//! (`/config`, `/blocks/ABCD`). Config paths use the dotted form
//! (`Addresses.API`) and parse into the same type.
//!
//! Segment rules:
//! - Must be non-empty
//! - Must not contain `/` or NUL
//! - Must not be `.` or `..`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Structured identifier used for root-namespace and config addressing.
///
/// Equality is structural: two keys are equal when their segments are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key {
    segments: Vec<String>,
}

impl Key {
    /// Parse a `/`-separated key.
    ///
    /// The leading slash is optional; repeated and trailing separators are
    /// collapsed.
    ///
    /// ```
    /// use cairn_types::Key;
    ///
    /// let key = Key::new("blocks//abc/").unwrap();
    /// assert_eq!(key.to_string(), "/blocks/abc");
    /// assert!(Key::new("/").is_err());
    /// ```
    pub fn new(raw: &str) -> Result<Self, TypeError> {
        Self::from_segments(raw.split('/').filter(|s| !s.is_empty()))
    }

    /// Build a key from explicit segments, validating each one.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(TypeError::EmptyKey);
        }
        for segment in &segments {
            validate_segment(segment)?;
        }
        Ok(Self { segments })
    }

    /// Parse a dotted config path such as `Addresses.API`.
    ///
    /// Unlike [`Key::new`], empty segments are rejected rather than collapsed:
    /// `a..b` names no path.
    pub fn from_dotted(raw: &str) -> Result<Self, TypeError> {
        if raw.is_empty() {
            return Err(TypeError::EmptyKey);
        }
        Self::from_segments(raw.split('.'))
    }

    /// Parse a key literal.
    ///
    /// # Panics
    ///
    /// Panics if `raw` is not a valid key. Intended for string literals only;
    /// use [`Key::new`] for anything supplied at runtime.
    pub fn from_static(raw: &'static str) -> Self {
        match Self::new(raw) {
            Ok(key) => key,
            Err(e) => panic!("invalid static key {raw:?}: {e}"),
        }
    }

    /// Single-segment key from a segment the caller has already validated.
    pub(crate) fn from_trusted_segment(segment: String) -> Self {
        Self {
            segments: vec![segment],
        }
    }

    /// The ordered segments of this key.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments (always at least one).
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Keys are never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The last segment.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// The key one level up, or `None` for a single-segment key.
    pub fn parent(&self) -> Option<Key> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append one segment.
    pub fn child(&self, segment: impl Into<String>) -> Result<Key, TypeError> {
        let segment = segment.into();
        validate_segment(&segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    /// Returns `true` if `other` lies strictly below this key.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        other.segments.len() > self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Returns `true` if this key equals `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &Key) -> bool {
        prefix == self || prefix.is_ancestor_of(self)
    }

    /// Dotted rendering (`a.b.c`), the inverse of [`Key::from_dotted`].
    pub fn to_dotted(&self) -> String {
        self.segments.join(".")
    }
}

fn validate_segment(segment: &str) -> Result<(), TypeError> {
    let reason = if segment.is_empty() {
        "segment must not be empty"
    } else if segment.contains('/') {
        "segment must not contain '/'"
    } else if segment.contains('\0') {
        "segment must not contain NUL"
    } else if segment == "." || segment == ".." {
        "segment must not be a relative path component"
    } else {
        return Ok(());
    };
    Err(TypeError::InvalidSegment {
        segment: segment.to_string(),
        reason: reason.into(),
    })
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}

impl FromStr for Key {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Key {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for Key {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_normalizes_separators() {
        let key = Key::new("//a///b/").unwrap();
        assert_eq!(key.segments(), &["a".to_string(), "b".to_string()]);
        assert_eq!(key.to_string(), "/a/b");
    }

    #[test]
    fn leading_slash_is_optional() {
        assert_eq!(Key::new("config").unwrap(), Key::new("/config").unwrap());
    }

    #[test]
    fn reject_empty_keys() {
        assert_eq!(Key::new("").unwrap_err(), TypeError::EmptyKey);
        assert_eq!(Key::new("///").unwrap_err(), TypeError::EmptyKey);
        assert_eq!(
            Key::from_segments(Vec::<String>::new()).unwrap_err(),
            TypeError::EmptyKey
        );
    }

    #[test]
    fn reject_relative_components() {
        assert!(Key::new("/a/../b").is_err());
        assert!(Key::new("/./a").is_err());
        assert!(Key::from_segments(["a/b"]).is_err());
    }

    #[test]
    fn static_keys() {
        assert_eq!(Key::from_static("/config").to_string(), "/config");
    }

    #[test]
    #[should_panic(expected = "invalid static key")]
    fn static_key_panics_on_invalid_literal() {
        Key::from_static("/");
    }

    #[test]
    fn dotted_paths() {
        let key = Key::from_dotted("Addresses.API").unwrap();
        assert_eq!(key.segments(), &["Addresses".to_string(), "API".to_string()]);
        assert_eq!(key.to_dotted(), "Addresses.API");
        assert!(Key::from_dotted("").is_err());
        assert!(Key::from_dotted("a..b").is_err());
        assert!(Key::from_dotted(".a").is_err());
    }

    #[test]
    fn parent_and_child() {
        let key = Key::new("/a/b").unwrap();
        assert_eq!(key.parent().unwrap(), Key::new("/a").unwrap());
        assert!(Key::new("/a").unwrap().parent().is_none());
        assert_eq!(key.child("c").unwrap().to_string(), "/a/b/c");
        assert_eq!(key.name(), "b");
    }

    #[test]
    fn ancestry() {
        let a = Key::new("/a").unwrap();
        let ab = Key::new("/a/b").unwrap();
        let abc = Key::new("/abc").unwrap();
        assert!(a.is_ancestor_of(&ab));
        assert!(!ab.is_ancestor_of(&a));
        assert!(!a.is_ancestor_of(&a));
        assert!(!a.is_ancestor_of(&abc));
        assert!(a.starts_with(&a));
        assert!(ab.starts_with(&a));
    }

    #[test]
    fn serde_uses_text_form() {
        let key = Key::new("/x/y").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"/x/y\"");
        let back: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<Key>("\"/\"").is_err());
    }

    proptest! {
        #[test]
        fn text_form_reparses_to_same_key(segments in proptest::collection::vec("[a-zA-Z0-9_-]{1,8}", 1..6)) {
            let key = Key::from_segments(segments.clone()).unwrap();
            let reparsed = Key::new(&key.to_string()).unwrap();
            prop_assert_eq!(reparsed.segments(), &segments[..]);
            prop_assert_eq!(reparsed, key);
        }
    }
}
