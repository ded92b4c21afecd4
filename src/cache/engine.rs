//! Page Cache Engine
//!
//! Decides which requests are cached, turns a rendered page into stored
//! artifacts and removes them again on invalidation.

use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;

use axum::http::Method;
use chrono::{DateTime, Local};
use flate2::{write::GzEncoder, Compression};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::cache::key::{ArtifactPaths, CacheKey, Scope};
use crate::cache::request::{split_target, PageRequest};
use crate::cache::stats::{CacheStats, StatsSnapshot};
use crate::cache::storage::DiskStorage;
use crate::error::{CacheError, Result};
use crate::minify::{Minifier, MinifyOptions};

static CLOSING_HTML: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</html\s*>").expect("valid regex"));

// == Options ==
/// Engine settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Cache root directory
    pub root: PathBuf,
    /// Host assumed for invalidation targets given as bare paths
    pub default_host: String,
    /// Master switch; when off no request is eligible
    pub enable_html_cache: bool,
    /// Also store a gzip artifact next to the raw one
    pub enable_gzip: bool,
    /// Smallest buffer, in bytes, worth caching
    pub min_size: usize,
    /// Substrings of the request target that disable caching
    pub excluded_paths: Vec<String>,
}

// == Capture Handle ==
/// Issued by [`PageCache::begin`] for a request that will be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureHandle {
    url_path: String,
    host: String,
    scope: Scope,
}

impl CaptureHandle {
    pub fn url_path(&self) -> &str {
        &self.url_path
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::derive(&self.url_path, &self.host)
    }
}

/// A stored artifact returned by the read path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub body: Vec<u8>,
    /// Body is the gzip artifact
    pub gzip: bool,
}

// == Page Cache ==
/// Full-page cache engine.
///
/// Every method takes `&self`; the file system is the only shared state and
/// concurrent writers of the same page resolve as last-writer-wins.
#[derive(Debug)]
pub struct PageCache {
    options: CacheOptions,
    storage: DiskStorage,
    minifier: Minifier,
    stats: CacheStats,
}

impl PageCache {
    // == Constructor ==
    /// Creates the engine and prepares the cache root.
    ///
    /// A root that cannot be created is logged, not fatal: every request is
    /// then ineligible and pages are served live.
    pub fn new(options: CacheOptions, minify: MinifyOptions) -> Self {
        let storage = DiskStorage::new(options.root.clone());
        if let Err(e) = storage.prepare() {
            warn!("Cache root {} unavailable: {}", options.root.display(), e);
        }

        Self {
            options,
            storage,
            minifier: Minifier::new(minify),
            stats: CacheStats::new(),
        }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn storage(&self) -> &DiskStorage {
        &self.storage
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // == Eligibility ==
    /// Cheap, side-effect free check run before any buffering.
    pub fn is_eligible(&self, request: &PageRequest) -> bool {
        match self.ineligibility(request) {
            Some(reason) => {
                debug!("Not caching {}: {}", request.target, reason);
                false
            }
            None => true,
        }
    }

    fn ineligibility(&self, request: &PageRequest) -> Option<String> {
        if !self.options.enable_html_cache {
            return Some("page cache disabled".into());
        }
        if request.method != Method::GET && request.method != Method::HEAD {
            return Some(format!("method {}", request.method));
        }
        if request.url_path().is_none() {
            return Some("unparseable request target".into());
        }
        if request.is_search {
            return Some("search results".into());
        }
        if request.is_preview {
            return Some("preview".into());
        }
        if let Some(pattern) = self
            .options
            .excluded_paths
            .iter()
            .find(|pattern| request.target.contains(pattern.as_str()))
        {
            return Some(format!("excluded pattern {}", pattern));
        }
        if !self.storage.is_writable() {
            let err = CacheError::StorageUnavailable(self.storage.root().display().to_string());
            return Some(err.to_string());
        }
        None
    }

    // == Capture ==
    /// First phase: returns a handle when the request's output should be
    /// captured, `None` to serve it live untouched.
    pub fn begin(&self, request: &PageRequest) -> Option<CaptureHandle> {
        if !self.is_eligible(request) {
            return None;
        }

        Some(CaptureHandle {
            url_path: request.url_path()?,
            host: request.host.clone(),
            scope: request.scope(),
        })
    }

    /// Second phase: transforms and stores the rendered page, returning the
    /// exact content that was stored so the live response matches the cache.
    ///
    /// Storage failures are logged and counted; they never change what the
    /// visitor receives.
    pub fn finish(&self, handle: CaptureHandle, buffer: String) -> String {
        if buffer.len() < self.options.min_size {
            debug!(
                "Buffer too small to cache: {} bytes for {}",
                buffer.len(),
                handle.url_path
            );
            self.stats.record_skip();
            return buffer;
        }

        let minified = if self.minifier.is_enabled() {
            self.minifier.process(&buffer)
        } else {
            buffer
        };
        // Added after minification so comment stripping keeps it.
        let page = insert_provenance_marker(&minified, &handle.scope, Local::now());

        let key = handle.key();
        if let Err(e) = self.storage.ensure_scope_dir(&handle.scope) {
            warn!(
                "Failed to prepare cache directory for {}: {}",
                handle.scope.describe(),
                e
            );
            self.stats.record_write_failure();
            return page;
        }
        let paths = ArtifactPaths::resolve(self.storage.root(), &handle.scope, &key);

        if let Err(e) = self.storage.write(&paths.raw, page.as_bytes()) {
            warn!("Failed to write cache file: {}", e);
            self.stats.record_write_failure();
            return page;
        }

        if self.options.enable_gzip {
            let written = gzip(page.as_bytes())
                .map_err(CacheError::from)
                .and_then(|bytes| self.storage.write(&paths.compressed, &bytes));
            if let Err(e) = written {
                warn!("Failed to write compressed cache file: {}", e);
                self.stats.record_write_failure();
                self.discard(&paths.compressed);
            }
        } else {
            self.discard(&paths.compressed);
        }

        self.stats.record_store();
        info!(
            "Cached {} for {} at {}",
            handle.url_path,
            handle.scope.describe(),
            paths.raw.display()
        );
        page
    }

    /// Runs both phases for a request whose full output is already in hand.
    pub fn capture_and_store(&self, request: &PageRequest, raw_buffer: String) -> String {
        match self.begin(request) {
            Some(handle) => self.finish(handle, raw_buffer),
            None => raw_buffer,
        }
    }

    /// Removes a compressed artifact that would otherwise be stale.
    fn discard(&self, path: &std::path::Path) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove stale {}: {}", path.display(), e);
            }
        }
    }

    // == Read Path ==
    /// Returns the stored artifact for `request`, preferring the compressed
    /// one when the client accepts gzip.
    pub fn lookup(&self, request: &PageRequest, accept_gzip: bool) -> Option<CachedArtifact> {
        if !self.is_eligible(request) {
            return None;
        }

        let key = CacheKey::derive(&request.url_path()?, &request.host);
        let paths = ArtifactPaths::resolve(self.storage.root(), &request.scope(), &key);

        let candidates = [(&paths.compressed, true), (&paths.raw, false)];
        for (path, gzip) in candidates {
            if gzip && !accept_gzip {
                continue;
            }
            match self.storage.read(path) {
                Ok(Some(body)) => {
                    self.stats.record_hit();
                    return Some(CachedArtifact { body, gzip });
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to read {}: {}", path.display(), e),
            }
        }

        self.stats.record_miss();
        None
    }

    // == Invalidation ==
    /// Deletes every artifact of one page, anonymous and per-viewer.
    ///
    /// Returns `false` only when `url` is empty or unparseable.
    pub fn invalidate_page(&self, url: &str) -> bool {
        match self.purge_page(url) {
            Ok(_) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    /// Like [`invalidate_page`](Self::invalidate_page) but reports how many
    /// files were removed.
    pub fn purge_page(&self, url: &str) -> Result<usize> {
        let (path, host) = split_target(url, &self.options.default_host)
            .ok_or_else(|| CacheError::InvalidInvalidationTarget(url.to_string()))?;
        let key = CacheKey::derive(&path, &host);

        let removed = self.purge(Some(&key));
        self.stats.record_invalidation();
        info!("Cleared cache for {} ({} files)", url, removed);
        Ok(removed)
    }

    /// Deletes every artifact in the cache. Directories are kept.
    pub fn invalidate_all(&self) -> bool {
        self.purge_all();
        true
    }

    /// Like [`invalidate_all`](Self::invalidate_all) but reports how many
    /// files were removed.
    pub fn purge_all(&self) -> usize {
        let removed = self.purge(None);
        self.stats.record_invalidation();
        info!("Cleared entire page cache ({} files)", removed);
        removed
    }

    /// Host signalled that a resource changed; drops its canonical page.
    pub fn content_changed(&self, resource_id: &str, canonical_url: &str) -> bool {
        debug!("Content changed: {} -> {}", resource_id, canonical_url);
        self.invalidate_page(canonical_url)
    }

    /// Removes matching artifacts under the anonymous root and every viewer
    /// directory. Files written after enumeration began may survive.
    fn purge(&self, key: Option<&CacheKey>) -> usize {
        let mut dirs = vec![self.storage.root().to_path_buf()];
        match self.storage.viewer_dirs() {
            Ok(viewer_dirs) => dirs.extend(viewer_dirs),
            Err(e) => warn!("Failed to list viewer cache directories: {}", e),
        }

        dirs.iter()
            .map(|dir| match self.storage.remove_artifacts(dir, key) {
                Ok(count) => count,
                Err(e) => {
                    warn!("Failed to clear {}: {}", dir.display(), e);
                    0
                }
            })
            .sum()
    }
}

/// Inserts the provenance comment before the last closing `</html>`.
/// Pages without one are returned unchanged.
pub fn insert_provenance_marker(buffer: &str, scope: &Scope, now: DateTime<Local>) -> String {
    let Some(closing) = CLOSING_HTML.find_iter(buffer).last() else {
        return buffer.to_string();
    };

    let marker = format!(
        "<!-- Cached by page_cache on {} for {} -->\n",
        now.format("%Y-%m-%d %H:%M:%S"),
        scope.describe()
    );

    let mut out = String::with_capacity(buffer.len() + marker.len());
    out.push_str(&buffer[..closing.start()]);
    out.push_str(&marker);
    out.push_str(&buffer[closing.start()..]);
    out
}

fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    encoder.finish()
}
