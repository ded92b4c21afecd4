//! Disk Storage Module
//!
//! File-system backend for page artifacts: protected directories, atomic
//! writes, reads and pattern deletes.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::cache::key::{CacheKey, Scope, COMPRESSED_EXTENSION, RAW_EXTENSION, USERS_DIR};
use crate::error::{CacheError, Result};

/// Marker written into every cache directory so the web server refuses to
/// list or execute its contents.
pub const PROTECTION_MARKER: &str = ".htaccess";

const PROTECTION_RULES: &str = "deny from all\n";

// == Disk Storage ==
/// Cache artifacts on the local file system.
#[derive(Debug)]
pub struct DiskStorage {
    root: PathBuf,
    /// Outcome of the last write check
    writable: AtomicBool,
}

impl DiskStorage {
    /// Creates a storage handle rooted at `root`. Nothing is created yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writable: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // == Directories ==
    /// Creates the cache root and its protection marker if missing.
    pub fn prepare(&self) -> Result<()> {
        let prepared = ensure_directory(&self.root);
        self.check_writable();
        prepared
    }

    /// Creates the directory for `scope` on demand and returns it.
    pub fn ensure_scope_dir(&self, scope: &Scope) -> Result<PathBuf> {
        let dir = scope.dir(&self.root);
        if let Scope::User(_) = scope {
            ensure_directory(&self.root.join(USERS_DIR))?;
        }
        ensure_directory(&dir)?;
        Ok(dir)
    }

    /// True when the root exists as a directory we may write into.
    ///
    /// A positive result is remembered until a write fails; a negative one
    /// is checked again on every call so a repaired root is picked up.
    pub fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Relaxed) || self.check_writable()
    }

    /// Checks writability by creating and dropping a temp file in the root.
    /// Permission bits alone say nothing about which user owns the root.
    fn check_writable(&self) -> bool {
        let writable = fs::metadata(&self.root).is_ok_and(|meta| meta.is_dir())
            && NamedTempFile::new_in(&self.root).is_ok();
        self.writable.store(writable, Ordering::Relaxed);
        writable
    }

    // == Write ==
    /// Writes `contents` to `path` through a temp file and rename, so readers
    /// never observe a partially written artifact.
    pub fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let written = self.write_atomic(path, contents);
        if written.is_err() {
            self.check_writable();
        }
        written
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let dir = path.parent().unwrap_or(&self.root);
        let wrap = |source: std::io::Error| CacheError::WriteFailure {
            path: path.to_path_buf(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(wrap)?;
        tmp.write_all(contents).map_err(wrap)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))
                .map_err(wrap)?;
        }
        tmp.persist(path).map_err(|e| wrap(e.error))?;
        Ok(())
    }

    // == Read ==
    /// Reads an artifact, `None` if it does not exist.
    pub fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // == Delete ==
    /// Deletes the artifacts of `key` (or every artifact when `key` is `None`)
    /// directly inside `dir`. Returns the number of files removed.
    ///
    /// Symlinks and anything that is not a regular file are skipped. A file
    /// created after enumeration starts may survive the pass.
    pub fn remove_artifacts(&self, dir: &Path, key: Option<&CacheKey>) -> Result<usize> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if !file_type.is_file() {
                continue;
            }

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !is_artifact_of(name, key) {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!("Deleted cache file: {}", entry.path().display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to delete {}: {}", entry.path().display(), e),
            }
        }

        Ok(removed)
    }

    /// Lists every per-viewer directory. Symlinked entries are ignored.
    pub fn viewer_dirs(&self) -> Result<Vec<PathBuf>> {
        let users = self.root.join(USERS_DIR);
        let entries = match fs::read_dir(&users) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }
}

fn ensure_directory(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    let marker = dir.join(PROTECTION_MARKER);
    if !marker.exists() {
        fs::write(&marker, PROTECTION_RULES)?;
    }
    Ok(())
}

fn is_artifact_of(name: &str, key: Option<&CacheKey>) -> bool {
    let Some(stem) = name
        .strip_suffix(COMPRESSED_EXTENSION)
        .or_else(|| name.strip_suffix(RAW_EXTENSION))
        .and_then(|rest| rest.strip_suffix('.'))
    else {
        return false;
    };

    match key {
        Some(key) => stem == key.as_str(),
        None => true,
    }
}
