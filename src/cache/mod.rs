//! Cache Module
//!
//! Full-page cache: key derivation, request eligibility, disk storage and
//! invalidation.

mod engine;
mod key;
mod request;
mod stats;
mod storage;


// Re-export public types
pub use engine::{
    insert_provenance_marker, CacheOptions, CachedArtifact, CaptureHandle, PageCache,
};
pub use key::{ArtifactPaths, CacheKey, Scope, ViewerId, USERS_DIR};
pub use request::{normalize_host, split_target, url_path, PageRequest};
pub use stats::{CacheStats, StatsSnapshot};
pub use storage::{DiskStorage, PROTECTION_MARKER};

// == Public Constants ==
/// Buffers shorter than this many bytes are never stored.
pub const MIN_CACHE_SIZE: usize = 255;

/// Request target substrings that are never cached.
pub const DEFAULT_EXCLUDED_PATHS: [&str; 14] = [
    "wp-login.php",
    "wp-admin",
    "wp-cron.php",
    "wp-content",
    "wp-includes",
    "xmlrpc.php",
    "wp-api",
    "/cart/",
    "/checkout/",
    "/my-account/",
    "add-to-cart",
    "logout",
    "lost-password",
    "register",
];
