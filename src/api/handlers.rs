//! API Handlers
//!
//! HTTP request handlers for the health, stats and admin endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
    Json,
};
use tracing::warn;

use crate::cache::PageCache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearPageRequest, ClearResponse, ContentChangedRequest, HealthResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Page cache engine shared with the capture middleware
    pub cache: Arc<PageCache>,
    /// Bearer token for the admin routes, `None` when they are disabled
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    /// Creates a new AppState around an engine.
    pub fn new(cache: PageCache, admin_token: Option<String>) -> Self {
        Self {
            cache: Arc::new(cache),
            admin_token: admin_token.map(Arc::from),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the engine, which prepares the cache root.
    pub fn from_config(config: &Config) -> Self {
        let cache = PageCache::new(config.cache.clone(), config.minify.clone());
        Self::new(cache, config.admin_token.clone())
    }
}

/// Runs a file-system bound engine call on the blocking pool.
async fn run_blocking<T, F>(cache: &Arc<PageCache>, f: F) -> Result<T>
where
    F: FnOnce(&PageCache) -> T + Send + 'static,
    T: Send + 'static,
{
    let cache = Arc::clone(cache);
    tokio::task::spawn_blocking(move || f(&cache))
        .await
        .map_err(|e| CacheError::Internal(e.to_string()))
}

/// Rejects admin requests without the configured bearer token.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(CacheError::Unauthorized);
    };

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    if provided != Some(expected) {
        warn!("Rejected admin request to {}", request.uri().path());
        return Err(CacheError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// Handler for POST /admin/cache/clear-page
///
/// Deletes every stored copy of one page.
pub async fn clear_page_handler(
    State(state): State<AppState>,
    Json(req): Json<ClearPageRequest>,
) -> Result<Json<ClearResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidInvalidationTarget(error_msg));
    }

    let url = req.url.clone();
    let removed = run_blocking(&state.cache, move |cache| cache.purge_page(&url)).await??;

    Ok(Json(ClearResponse::page(req.url, removed)))
}

/// Handler for POST /admin/cache/clear-all
pub async fn clear_all_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let removed = run_blocking(&state.cache, |cache| cache.purge_all()).await?;
    Ok(Json(ClearResponse::all(removed)))
}

/// Handler for POST /admin/cache/content-changed
///
/// Called by the host after it saves a piece of content.
pub async fn content_changed_handler(
    State(state): State<AppState>,
    Json(req): Json<ContentChangedRequest>,
) -> Result<Json<ClearResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let (resource_id, url) = (req.resource_id.clone(), req.url.clone());
    let cleared = run_blocking(&state.cache, move |cache| {
        cache.content_changed(&resource_id, &url)
    })
    .await?;

    if !cleared {
        return Err(CacheError::InvalidInvalidationTarget(req.url));
    }
    Ok(Json(ClearResponse::changed(&req.resource_id, req.url)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let writable = state.cache.storage().is_writable();
    Json(HealthResponse::healthy(writable))
}
