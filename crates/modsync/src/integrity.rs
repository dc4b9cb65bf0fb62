//! Content-hash verification for downloaded and synced files

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;

use crate::error::{ActionError, Result};

/// Hash algorithms this crate can recompute locally, in preference order.
const SUPPORTED_ALGOS: &[&str] = &["sha512", "sha256"];

/// Expected content hashes and size for a file.
///
/// Platforms publish different algorithms, so hashes are kept as an
/// algorithm-keyed map; verification uses the first algorithm we can
/// recompute and falls back to a size check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrity {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hashes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Outcome of checking a file against an [`Integrity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityCheck {
    Ok,
    SizeMismatch { expected: u64, actual: u64 },
    HashMismatch {
        algo: String,
        expected: String,
        actual: String,
    },
}

impl Integrity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hash(mut self, algo: impl Into<String>, hex_digest: impl Into<String>) -> Self {
        self.hashes.insert(algo.into(), hex_digest.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// True when there is nothing to verify against.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty() && self.size.is_none()
    }

    /// The first expected hash we know how to recompute, if any.
    fn verifiable_hash(&self) -> Option<(&str, &str)> {
        SUPPORTED_ALGOS
            .iter()
            .find_map(|algo| self.hashes.get(*algo).map(|h| (*algo, h.as_str())))
    }

    /// Check a file on disk. Size first (cheapest), then content hash.
    pub async fn check(&self, path: &Path) -> Result<IntegrityCheck> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ActionError::fs(path, e))?;

        if let Some(expected) = self.size {
            if metadata.len() != expected {
                return Ok(IntegrityCheck::SizeMismatch {
                    expected,
                    actual: metadata.len(),
                });
            }
        }

        if let Some((algo, expected)) = self.verifiable_hash() {
            let actual = hash_file(path, algo).await?;
            if !actual.eq_ignore_ascii_case(expected) {
                debug!("hash mismatch on {}: {} != {}", path.display(), actual, expected);
                return Ok(IntegrityCheck::HashMismatch {
                    algo: algo.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        Ok(IntegrityCheck::Ok)
    }

    /// Convenience wrapper: does the file match?
    pub async fn matches(&self, path: &Path) -> Result<bool> {
        Ok(self.check(path).await? == IntegrityCheck::Ok)
    }
}

/// Hex digest of a file with the given algorithm. Hashing runs on the
/// blocking pool so large files never stall the runtime.
pub async fn hash_file(path: &Path, algo: &str) -> Result<String> {
    let path = path.to_path_buf();
    let algo = algo.to_string();

    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path).map_err(|e| ActionError::fs(&path, e))?;
        let digest = match algo.as_str() {
            "sha512" => {
                let mut hasher = Sha512::new();
                std::io::copy(&mut file, &mut hasher).map_err(|e| ActionError::fs(&path, e))?;
                hex::encode(hasher.finalize())
            }
            _ => {
                let mut hasher = Sha256::new();
                std::io::copy(&mut file, &mut hasher).map_err(|e| ActionError::fs(&path, e))?;
                hex::encode(hasher.finalize())
            }
        };
        Ok(digest)
    })
    .await
    .map_err(|e| ActionError::FileSystem {
        path: "<hash task>".into(),
        source: std::io::Error::other(e),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Digest;

    fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    #[tokio::test]
    async fn matching_hash_and_size_pass() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jar");
        tokio::fs::write(&path, b"mod bytes").await.unwrap();

        let integrity = Integrity::new()
            .with_hash("sha256", sha256_hex(b"mod bytes"))
            .with_size(9);

        assert_eq!(integrity.check(&path).await.unwrap(), IntegrityCheck::Ok);
    }

    #[tokio::test]
    async fn wrong_hash_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jar");
        tokio::fs::write(&path, b"mod bytes").await.unwrap();

        let integrity = Integrity::new().with_hash("sha256", sha256_hex(b"other bytes"));

        match integrity.check(&path).await.unwrap() {
            IntegrityCheck::HashMismatch { algo, .. } => assert_eq!(algo, "sha256"),
            other => panic!("expected hash mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn size_checked_before_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jar");
        tokio::fs::write(&path, b"mod bytes").await.unwrap();

        let integrity = Integrity::new()
            .with_hash("sha256", sha256_hex(b"mod bytes"))
            .with_size(1);

        assert!(matches!(
            integrity.check(&path).await.unwrap(),
            IntegrityCheck::SizeMismatch { expected: 1, actual: 9 }
        ));
    }

    #[tokio::test]
    async fn unknown_algorithms_fall_back_to_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jar");
        tokio::fs::write(&path, b"mod bytes").await.unwrap();

        // murmur2 is not recomputable locally; size alone decides.
        let integrity = Integrity::new().with_hash("murmur2", "12345").with_size(9);
        assert!(integrity.matches(&path).await.unwrap());
    }
}
