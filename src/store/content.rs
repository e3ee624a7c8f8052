//! Content-addressed object store and project fingerprinting.
//!
//! Every ingested file payload lives here exactly once, keyed by the
//! SHA-256 of its raw bytes. Deduplication across uploads falls out of the
//! addressing scheme; `put` of an existing hash is a no-op.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

use crate::core::errors::{CodefolioError, Result};

/// Compute the content address for a byte payload: 64-char lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex_encode(&digest)
}

/// Deterministic fingerprint over a project's `(rel_path, content_hash)`
/// set, encoded as 64-char lowercase hex.
///
/// Entries are sorted lexicographically by `rel_path` and framed as
/// `u64-le(len(path)) ‖ path ‖ hash` before digesting, so path/hash
/// concatenations cannot collide.
pub fn project_fingerprint<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut sorted: Vec<(&str, &str)> = entries.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    for (rel_path, hash) in sorted {
        hasher.update((rel_path.len() as u64).to_le_bytes());
        hasher.update(rel_path.as_bytes());
        hasher.update(hash.as_bytes());
    }
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Filesystem-backed content store with two-level hash fan-out
/// (`objects/ab/cdef…`).
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Open (or lazily create) a content store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store a payload and return its content address. Idempotent: storing
    /// bytes that already exist leaves the object untouched.
    pub async fn put(&self, bytes: &[u8]) -> Result<String> {
        let hash = content_hash(bytes);
        let path = self.object_path(&hash);

        if fs::try_exists(&path).await.unwrap_or(false) {
            debug!(hash = %hash, "content object already present");
            return Ok(hash);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                CodefolioError::io(format!("creating object directory for {hash}"), e)
            })?;
        }

        // Write through a temp name so a crash never leaves a partial
        // object at its final address.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| CodefolioError::io(format!("writing object {hash}"), e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| CodefolioError::io(format!("committing object {hash}"), e))?;

        Ok(hash)
    }

    /// Fetch a payload by content address.
    pub async fn get(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.object_path(hash);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CodefolioError::not_found("content object", hash))
            }
            Err(e) => Err(CodefolioError::io(format!("reading object {hash}"), e)),
        }
    }

    /// Whether an object with this address exists.
    pub async fn contains(&self, hash: &str) -> bool {
        fs::try_exists(self.object_path(hash)).await.unwrap_or(false)
    }

    fn object_path(&self, hash: &str) -> PathBuf {
        let (prefix, rest) = hash.split_at(2.min(hash.len()));
        self.root.join("objects").join(prefix).join(rest)
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_hash_is_sha256_hex() {
        let hash = content_hash(b"hello");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        let hash = store.put(b"fn main() {}").await.unwrap();
        let bytes = store.get(&hash).await.unwrap();
        assert_eq!(bytes, b"fn main() {}");
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        let first = store.put(b"same payload").await.unwrap();
        let second = store.put(b"same payload").await.unwrap();
        assert_eq!(first, second);
        assert!(store.contains(&first).await);
    }

    #[tokio::test]
    async fn test_get_unknown_hash_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        let err = store.get(&"0".repeat(64)).await.unwrap_err();
        assert!(matches!(err, CodefolioError::NotFound { .. }));
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let a = project_fingerprint([("src/main.py", "h1"), ("README.md", "h2")]);
        let b = project_fingerprint([("README.md", "h2"), ("src/main.py", "h1")]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_tracks_content_changes() {
        let base = project_fingerprint([("src/main.py", "h1")]);
        let changed = project_fingerprint([("src/main.py", "h2")]);
        let renamed = project_fingerprint([("src/app.py", "h1")]);
        assert_ne!(base, changed);
        assert_ne!(base, renamed);
    }

    #[test]
    fn test_fingerprint_framing_resists_concatenation_tricks() {
        // "ab" + "c…" must not collide with "a" + "bc…" once framed.
        let a = project_fingerprint([("ab", "cd")]);
        let b = project_fingerprint([("a", "bcd")]);
        assert_ne!(a, b);
    }
}
