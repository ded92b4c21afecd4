//! Request Metadata Module
//!
//! The slice of an incoming request the cache engine needs to decide
//! eligibility and derive keys.

use axum::http::Method;
use url::Url;

use crate::cache::{Scope, ViewerId};

// == Page Request ==
/// Request metadata supplied by the host.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// HTTP method
    pub method: Method,
    /// Raw request target, e.g. `/about/?ref=home`
    pub target: String,
    /// Host the request was addressed to, see [`normalize_host`]
    pub host: String,
    /// Authenticated viewer, `None` for anonymous visitors
    pub viewer: Option<ViewerId>,
    /// Request renders search results
    pub is_search: bool,
    /// Request renders a content preview
    pub is_preview: bool,
}

impl PageRequest {
    /// Creates an anonymous GET request for `target` on `host`.
    pub fn get(target: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            target: target.into(),
            host: normalize_host(&host.into()),
            viewer: None,
            is_search: false,
            is_preview: false,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_viewer(mut self, viewer: ViewerId) -> Self {
        self.viewer = Some(viewer);
        self
    }

    pub fn with_search(mut self, is_search: bool) -> Self {
        self.is_search = is_search;
        self
    }

    pub fn with_preview(mut self, is_preview: bool) -> Self {
        self.is_preview = is_preview;
        self
    }

    /// Path component of the request target, without query or fragment.
    ///
    /// Returns `None` when the target cannot be parsed.
    pub fn url_path(&self) -> Option<String> {
        url_path(&self.target)
    }

    /// Storage scope of this request.
    pub fn scope(&self) -> Scope {
        match &self.viewer {
            Some(id) => Scope::User(id.clone()),
            None => Scope::Anonymous,
        }
    }
}

/// Extracts the path of an origin-form (`/a/b?x`) or absolute-form
/// (`https://host/a/b`) request target.
pub fn url_path(target: &str) -> Option<String> {
    if target.starts_with('/') && !target.starts_with("//") {
        let end = target.find(['?', '#']).unwrap_or(target.len());
        return Some(target[..end].to_string());
    }

    let url = Url::parse(target).ok()?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return None;
    }
    Some(url.path().to_string())
}

/// Lowercases `host` and drops an explicit `:80` or `:443`, so a `Host`
/// header and an invalidation URL naming the same site yield the same key.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    match host.rsplit_once(':') {
        Some((name, "80" | "443")) if !name.is_empty() => name.to_string(),
        _ => host,
    }
}

/// Splits an invalidation target into (path, host).
///
/// Absolute URLs carry their own host; bare paths use `default_host`.
pub fn split_target(target: &str, default_host: &str) -> Option<(String, String)> {
    let target = target.trim();
    if target.is_empty() {
        return None;
    }

    if target.starts_with('/') && !target.starts_with("//") {
        return url_path(target).map(|path| (path, normalize_host(default_host)));
    }

    let url = Url::parse(target).ok()?;
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return None,
    };
    Some((url.path().to_string(), normalize_host(&host)))
}
