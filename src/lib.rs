//! Page Cache - full-page HTML caching for server-rendered sites
//!
//! Stores rendered pages on disk per URL and per viewer, with optional
//! minification and gzip artifacts, and drops them on content changes.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod minify;
pub mod models;

pub use api::{create_router, page_cache_layer, AppState};
pub use cache::{PageCache, PageRequest};
pub use config::Config;
pub use error::{CacheError, Result};
