//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;

use crate::cache::{CacheOptions, DEFAULT_EXCLUDED_PATHS, MIN_CACHE_SIZE};
use crate::minify::MinifyOptions;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Built once at startup and handed to the engine; nothing below the request
/// boundary reads the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Bearer token for the admin routes, `None` disables them
    pub admin_token: Option<String>,
    /// Page cache engine options
    pub cache: CacheOptions,
    /// Write-time minification options
    pub minify: MinifyOptions,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `ADMIN_TOKEN` - Admin bearer token (default: unset)
    /// - `CACHE_ROOT` - Cache directory (default: ./cache)
    /// - `SITE_HOST` - Host used when invalidating bare paths
    ///   (default: localhost:`SERVER_PORT`). Must match the `Host` header
    ///   visitors send, port included.
    /// - `ENABLE_HTML_CACHE` - Master switch (default: true)
    /// - `ENABLE_GZIP` - Write `.html.gz` artifacts (default: true)
    /// - `MINIFY_HTML`, `MINIFY_CSS`, `MINIFY_JS` - Minification stages (default: false)
    /// - `MIN_CACHE_SIZE` - Smallest cacheable body in bytes (default: 255)
    /// - `CACHE_EXCLUDED_PATHS` - Comma separated exclusion patterns
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a Config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|v| parse_bool(&v))
                .unwrap_or(default)
        };

        let server_port = lookup("SERVER_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.server_port);

        let cache = CacheOptions {
            root: lookup("CACHE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache.root),
            default_host: lookup("SITE_HOST").unwrap_or_else(|| local_host(server_port)),
            enable_html_cache: flag("ENABLE_HTML_CACHE", defaults.cache.enable_html_cache),
            enable_gzip: flag("ENABLE_GZIP", defaults.cache.enable_gzip),
            min_size: lookup("MIN_CACHE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache.min_size),
            excluded_paths: lookup("CACHE_EXCLUDED_PATHS")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.cache.excluded_paths),
        };

        let minify = MinifyOptions {
            html: flag("MINIFY_HTML", defaults.minify.html),
            css: flag("MINIFY_CSS", defaults.minify.css),
            js: flag("MINIFY_JS", defaults.minify.js),
            ..defaults.minify
        };

        Self {
            server_port,
            admin_token: lookup("ADMIN_TOKEN").filter(|t| !t.is_empty()),
            cache,
            minify,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let server_port = 3000;
        Self {
            server_port,
            admin_token: None,
            cache: CacheOptions {
                root: PathBuf::from("./cache"),
                default_host: local_host(server_port),
                enable_html_cache: true,
                enable_gzip: true,
                min_size: MIN_CACHE_SIZE,
                excluded_paths: DEFAULT_EXCLUDED_PATHS
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
            },
            minify: MinifyOptions::default(),
        }
    }
}

/// Host header a local visitor sends when reaching the server directly.
fn local_host(port: u16) -> String {
    format!("localhost:{}", port)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
