//! API Routes
//!
//! Configures the Axum router: public endpoints, the optional admin
//! surface and the cached site fallback.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, MethodRouter},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{
    clear_all_handler, clear_page_handler, content_changed_handler, health_handler,
    require_admin, stats_handler, AppState,
};
use super::middleware::page_cache_layer;
use super::pages::site_handler;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /stats` - Cache counters
/// - `POST /admin/cache/clear-page` - Clear one page (admin)
/// - `POST /admin/cache/clear-all` - Clear every page (admin)
/// - `POST /admin/cache/content-changed` - Content save notification (admin)
/// - anything else - site pages, served through the page cache
///
/// Admin routes exist only when an admin token is configured.
pub fn create_router(state: AppState) -> Router {
    let site: MethodRouter =
        get(site_handler).layer(from_fn_with_state(state.cache.clone(), page_cache_layer));

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler));

    if state.admin_token.is_some() {
        let admin = Router::new()
            .route("/clear-page", post(clear_page_handler))
            .route("/clear-all", post(clear_all_handler))
            .route("/content-changed", post(content_changed_handler))
            .route_layer(from_fn_with_state(state.clone(), require_admin));
        router = router.nest("/admin/cache", admin);
    }

    router
        .fallback_service(site)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
