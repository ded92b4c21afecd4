//! Cache Key Module
//!
//! Derives stable cache keys from (path, host) and maps them to artifact paths.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

/// Subdirectory of the cache root holding per-viewer artifacts.
pub const USERS_DIR: &str = "users";

/// Extension of the raw artifact.
pub const RAW_EXTENSION: &str = "html";

/// Extension of the compressed artifact.
pub const COMPRESSED_EXTENSION: &str = "html.gz";

const MAX_VIEWER_ID_LENGTH: usize = 64;

// == Cache Key ==
/// Fixed-width hex digest of `url_path + "|" + host`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a page. Pure and deterministic.
    pub fn derive(url_path: &str, host: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url_path.as_bytes());
        hasher.update(b"|");
        hasher.update(host.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the raw artifact for this key.
    pub fn raw_file_name(&self) -> String {
        format!("{}.{}", self.0, RAW_EXTENSION)
    }

    /// File name of the compressed artifact for this key.
    pub fn compressed_file_name(&self) -> String {
        format!("{}.{}", self.0, COMPRESSED_EXTENSION)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Viewer Id ==
/// Stable identifier of an authenticated viewer.
///
/// Restricted to `[A-Za-z0-9_-]{1,64}` so it is always a single safe path
/// component under `users/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewerId(String);

impl ViewerId {
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_VIEWER_ID_LENGTH
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(CacheError::InvalidRequest(format!(
                "Invalid viewer id: {:?}",
                raw
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Scope ==
/// Who a cached artifact belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Anonymous,
    User(ViewerId),
}

impl Scope {
    /// Human readable description used in the provenance marker.
    pub fn describe(&self) -> String {
        match self {
            Scope::Anonymous => "anonymous visitors".to_string(),
            Scope::User(id) => format!("viewer {}", id),
        }
    }

    /// Directory holding this scope's artifacts.
    pub fn dir(&self, root: &Path) -> PathBuf {
        match self {
            Scope::Anonymous => root.to_path_buf(),
            Scope::User(id) => root.join(USERS_DIR).join(id.as_str()),
        }
    }
}

// == Artifact Paths ==
/// Raw and compressed file locations for one (scope, key) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub raw: PathBuf,
    pub compressed: PathBuf,
}

impl ArtifactPaths {
    /// Resolves artifact paths without touching the file system.
    pub fn resolve(root: &Path, scope: &Scope, key: &CacheKey) -> Self {
        let dir = scope.dir(root);
        Self {
            raw: dir.join(key.raw_file_name()),
            compressed: dir.join(key.compressed_file_name()),
            dir,
        }
    }
}
