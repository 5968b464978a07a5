//! Shard identity and its flat-filename encoding.
//!
//! A shard is identified by its path relative to the corpus root with
//! components joined by `/`. Checkpoint files live in one flat directory, so
//! the path is escaped into a single filename component:
//!
//! | char | encoded |
//! |------|---------|
//! | `%`  | `%25`   |
//! | `/`  | `%2F`   |
//! | `\`  | `%5C`   |
//!
//! Every other character is kept. Escaping `%` itself makes the mapping
//! injective, so decoding recovers the exact path even when the path already
//! contains text that looks like an escape.

use std::fmt;
use std::path::{Component, Path};

use crate::error::{PipelineError, PipelineResult};

/// Encodes a relative shard path into a flat filename component.
#[must_use]
pub fn encode_shard_path(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            '/' => encoded.push_str("%2F"),
            '\\' => encoded.push_str("%5C"),
            other => encoded.push(other),
        }
    }
    encoded
}

/// Inverse of [`encode_shard_path`].
///
/// Returns `None` for anything `encode_shard_path` cannot produce: unknown
/// or truncated escapes, lowercase hex, and raw separators.
#[must_use]
pub fn decode_shard_path(encoded: &str) -> Option<String> {
    let mut decoded = String::with_capacity(encoded.len());
    let mut chars = encoded.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => {
                let escape = (chars.next()?, chars.next()?);
                decoded.push(match escape {
                    ('2', '5') => '%',
                    ('2', 'F') => '/',
                    ('5', 'C') => '\\',
                    _ => return None,
                });
            }
            '/' | '\\' => return None,
            other => decoded.push(other),
        }
    }
    Some(decoded)
}

/// Encoded shard identity, ordered by its encoded form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardKey(String);

impl ShardKey {
    /// Builds a key from a `/`-joined relative path.
    pub fn from_relative_path(relative: &str) -> PipelineResult<Self> {
        if relative.is_empty() {
            return Err(PipelineError::InvalidShardPath {
                path: relative.into(),
                reason: "empty relative path".to_string(),
            });
        }
        Ok(Self(encode_shard_path(relative)))
    }

    /// Builds a key for `path` relative to the corpus `root`.
    pub fn from_path(root: &Path, path: &Path) -> PipelineResult<Self> {
        let invalid = |reason: &str| PipelineError::InvalidShardPath {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let relative = path
            .strip_prefix(root)
            .map_err(|_| invalid("path is outside the corpus root"))?;

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    parts.push(part.to_str().ok_or_else(|| invalid("path is not valid UTF-8"))?)
                }
                Component::CurDir => {}
                _ => return Err(invalid("path must be a plain relative path")),
            }
        }

        Self::from_relative_path(&parts.join("/"))
    }

    /// Validates an encoded key read back from a checkpoint filename.
    pub fn from_encoded(encoded: &str) -> Option<Self> {
        match decode_shard_path(encoded) {
            Some(decoded) if !decoded.is_empty() => Some(Self(encoded.to_string())),
            _ => None,
        }
    }

    /// Encoded form, used as the checkpoint file stem.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Original relative path.
    #[must_use]
    pub fn relative_path(&self) -> String {
        // Keys are only built from valid encodings
        decode_shard_path(&self.0).unwrap_or_else(|| self.0.clone())
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let paths = [
            "part-00.jsonl",
            "en/wiki/part-01.jsonl.gz",
            "100%/done.jsonl",
            "literal%2Fslash.jsonl",
            "a___b/c___d.jsonl",
            "%25%25%",
            "back\\slash.json",
            "unicode/ñandú.jsonl",
        ];
        for path in paths {
            let encoded = encode_shard_path(path);
            assert!(!encoded.contains('/'), "{encoded} contains a separator");
            assert_eq!(decode_shard_path(&encoded).as_deref(), Some(path));
        }
    }

    #[test]
    fn test_encoding_is_injective() {
        // These collided under naive '/' -> '___' substitution
        let a = encode_shard_path("a/b");
        let b = encode_shard_path("a___b");
        assert_ne!(a, b);

        let c = encode_shard_path("x%2Fy");
        let d = encode_shard_path("x/y");
        assert_ne!(c, d);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(decode_shard_path("bad%"), None);
        assert_eq!(decode_shard_path("bad%2"), None);
        assert_eq!(decode_shard_path("bad%41"), None);
        assert_eq!(decode_shard_path("lower%2f"), None);
        assert_eq!(decode_shard_path("raw/slash"), None);
    }

    #[test]
    fn test_key_from_path() {
        let root = Path::new("/corpus");
        let key = ShardKey::from_path(root, Path::new("/corpus/en/part-00.jsonl")).unwrap();
        assert_eq!(key.as_str(), "en%2Fpart-00.jsonl");
        assert_eq!(key.relative_path(), "en/part-00.jsonl");
        assert_eq!(key.to_string(), "en/part-00.jsonl");

        assert!(ShardKey::from_path(root, Path::new("/elsewhere/x.jsonl")).is_err());
        assert!(ShardKey::from_path(root, root).is_err());
    }

    #[test]
    fn test_from_encoded() {
        let key = ShardKey::from_encoded("en%2Fpart-00.jsonl").unwrap();
        assert_eq!(key.relative_path(), "en/part-00.jsonl");
        assert!(ShardKey::from_encoded("").is_none());
        assert!(ShardKey::from_encoded("bad%zz").is_none());
    }

    #[test]
    fn test_keys_sort_by_encoded_form() {
        let mut keys = vec![
            ShardKey::from_relative_path("b.jsonl").unwrap(),
            ShardKey::from_relative_path("a/z.jsonl").unwrap(),
            ShardKey::from_relative_path("a.jsonl").unwrap(),
        ];
        keys.sort();
        let order: Vec<_> = keys.iter().map(ShardKey::as_str).collect();
        assert_eq!(order, vec!["a%2Fz.jsonl", "a.jsonl", "b.jsonl"]);
    }
}
