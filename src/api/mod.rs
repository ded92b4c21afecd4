//! API Module
//!
//! axum integration for the page cache: the capture middleware, a built-in
//! site renderer and the admin REST API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache counters
//! - `POST /admin/cache/clear-page` - Clear one page
//! - `POST /admin/cache/clear-all` - Clear the whole cache
//! - `POST /admin/cache/content-changed` - Content save notification

pub mod handlers;
pub mod middleware;
pub mod pages;
pub mod routes;

pub use handlers::*;
pub use middleware::{page_cache_layer, CACHE_STATUS_HEADER, VIEWER_HEADER};
pub use routes::create_router;
