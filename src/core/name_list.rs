//! Asset name registry
//!
//! The set of asset keys stored in a package. Serialized as a flat run of
//! NUL-terminated strings with no per-key length prefix:
//!
//! ```text
//! "hero.png\0" "music/theme.ogg\0" ...
//! ```

use crate::error::{PackageError, Result};
use std::collections::BTreeSet;

/// On-disk key terminator
pub const KEY_TERMINATOR: u8 = 0;

/// Validate an asset key for insertion
pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(PackageError::EmptyKey);
    }
    if key.as_bytes().contains(&KEY_TERMINATOR) {
        return Err(PackageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Read one terminated key starting at `*index`, advancing past the terminator
pub(crate) fn read_terminated_key(buf: &[u8], index: &mut usize) -> Result<String> {
    let rest = &buf[*index..];
    let len = rest
        .iter()
        .position(|&b| b == KEY_TERMINATOR)
        .ok_or(PackageError::Truncated("unterminated asset key"))?;

    let key = std::str::from_utf8(&rest[..len])
        .map_err(|_| PackageError::InvalidKey(String::from_utf8_lossy(&rest[..len]).into_owned()))?
        .to_string();

    *index += len + 1;
    Ok(key)
}

/// Registry of unique, non-empty asset keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameRegistry {
    names: BTreeSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a key is registered (the empty key never is)
    pub fn has(&self, key: &str) -> bool {
        !key.is_empty() && self.names.contains(key)
    }

    /// Register a new key
    pub fn append(&mut self, key: &str) -> Result<()> {
        check_key(key)?;
        if self.has(key) {
            return Err(PackageError::DuplicateKey(key.to_string()));
        }
        self.names.insert(key.to_string());
        Ok(())
    }

    /// Unregister a key
    pub fn remove(&mut self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(PackageError::EmptyKey);
        }
        if !self.names.remove(key) {
            return Err(PackageError::NotFound(key.to_string()));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// Keys in serialization order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Serialized size: one terminator byte per key
    pub fn byte_size(&self) -> usize {
        self.names.iter().map(|name| name.len() + 1).sum()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.byte_size());
        for name in &self.names {
            buf.extend_from_slice(name.as_bytes());
            buf.push(KEY_TERMINATOR);
        }
        buf
    }

    /// Replace the contents with the keys encoded in `buf`
    ///
    /// Loading stops at the first key that cannot be appended and that error
    /// is returned; keys read before it stay registered.
    pub fn deserialize(&mut self, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Err(PackageError::EmptyBuffer);
        }
        self.names.clear();

        let mut index = 0;
        while index < buf.len() {
            let name = read_terminated_key(buf, &mut index)?;
            self.append(&name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_has() {
        let mut names = NameRegistry::new();
        names.append("hero.png").unwrap();
        assert!(names.has("hero.png"));
        assert!(!names.has("Hero.png"));
        assert!(!names.has(""));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut names = NameRegistry::new();
        names.append("a").unwrap();
        assert!(matches!(names.append("a"), Err(PackageError::DuplicateKey(k)) if k == "a"));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_empty_and_invalid_keys() {
        let mut names = NameRegistry::new();
        assert!(matches!(names.append(""), Err(PackageError::EmptyKey)));
        assert!(matches!(names.append("a\0b"), Err(PackageError::InvalidKey(_))));
        assert!(matches!(names.remove(""), Err(PackageError::EmptyKey)));
        assert!(matches!(names.remove("x"), Err(PackageError::NotFound(_))));
    }

    #[test]
    fn test_remove() {
        let mut names = NameRegistry::new();
        names.append("a").unwrap();
        names.remove("a").unwrap();
        assert!(!names.has("a"));
        assert!(names.is_empty());
    }

    #[test]
    fn test_byte_size_and_layout() {
        let mut names = NameRegistry::new();
        names.append("bb").unwrap();
        names.append("a").unwrap();
        assert_eq!(names.byte_size(), 5);
        assert_eq!(names.serialize(), b"a\0bb\0".to_vec());
    }

    #[test]
    fn test_deserialize_roundtrip() {
        let mut names = NameRegistry::new();
        for key in ["textures/hero.png", "a", "sounds/jump.wav"] {
            names.append(key).unwrap();
        }
        let mut loaded = NameRegistry::new();
        loaded.append("stale").unwrap();
        loaded.deserialize(&names.serialize()).unwrap();
        assert_eq!(loaded, names);
    }

    #[test]
    fn test_deserialize_stops_at_duplicate() {
        let mut names = NameRegistry::new();
        let result = names.deserialize(b"a\0b\0a\0c\0");
        assert!(matches!(result, Err(PackageError::DuplicateKey(k)) if k == "a"));
        assert!(names.has("a"));
        assert!(names.has("b"));
        assert!(!names.has("c"));
    }

    #[test]
    fn test_deserialize_errors() {
        let mut names = NameRegistry::new();
        assert!(matches!(names.deserialize(&[]), Err(PackageError::EmptyBuffer)));
        assert!(matches!(names.deserialize(b"a\0\0"), Err(PackageError::EmptyKey)));
        assert!(matches!(names.deserialize(b"abc"), Err(PackageError::Truncated(_))));
        assert!(matches!(
            names.deserialize(&[0xff, 0xfe, 0]),
            Err(PackageError::InvalidKey(_))
        ));
    }
}
