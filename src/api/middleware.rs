//! Page capture middleware.
//!
//! Serves stored pages for eligible requests and stores the rendered HTML
//! of the ones that miss. Everything that touches the file system runs on
//! the blocking pool.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{
        header::{
            ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST,
            VARY,
        },
        HeaderMap, HeaderValue, Method, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::BytesMut;
use futures::{stream, StreamExt};
use tracing::{debug, instrument, warn};

use crate::cache::{CachedArtifact, PageCache, PageRequest, Scope, ViewerId};

/// Header carrying the authenticated viewer, set by an upstream auth layer.
pub const VIEWER_HEADER: &str = "x-viewer-id";

/// Response header reporting `HIT` or `MISS`.
pub const CACHE_STATUS_HEADER: &str = "x-page-cache";

/// Largest rendered body the middleware will buffer. Bigger pages are
/// streamed to the client uncached.
pub const MAX_CAPTURE_BYTES: usize = 8 * 1024 * 1024;

/// Stored pages differ per encoding and per viewer.
const VARY_VALUE: &str = "accept-encoding, x-viewer-id";

const SEARCH_PARAM: &str = "s";
const PREVIEW_PARAM: &str = "preview";

/// Middleware for full-page caching.
///
/// Requests the engine rejects pass straight through. Eligible ones are
/// answered from storage when possible; otherwise the inner handler runs
/// and a `200 OK` HTML body is stored and replaced by the stored version.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<Arc<PageCache>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(page) = page_request_from(&request, &cache.options().default_host) else {
        return next.run(request).await;
    };

    let Some(handle) = cache.begin(&page) else {
        return next.run(request).await;
    };

    let scope = page.scope();
    let accept_gzip = accepts_gzip(request.headers());
    let lookup = {
        let cache = Arc::clone(&cache);
        let page = page.clone();
        tokio::task::spawn_blocking(move || cache.lookup(&page, accept_gzip)).await
    };
    match lookup {
        Ok(Some(artifact)) => {
            debug!(outcome = "hit", gzip = artifact.gzip, "serving stored page");
            return cached_response(artifact, &scope);
        }
        Ok(None) => debug!(outcome = "miss", "rendering page"),
        Err(e) => warn!("Cache lookup task failed: {}", e),
    }

    let response = next.run(request).await;

    // HEAD responses carry no body worth storing.
    if page.method != Method::GET
        || response.status() != StatusCode::OK
        || !is_html(response.headers())
        || response.headers().contains_key(CONTENT_ENCODING)
    {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let declared = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > MAX_CAPTURE_BYTES) {
        debug!(bytes = declared, "Page too large to capture, not caching");
        return Response::from_parts(parts, body);
    }

    let bytes = match capture_body(body, MAX_CAPTURE_BYTES).await {
        Ok(Captured::Complete(bytes)) => bytes,
        Ok(Captured::TooLarge(body)) => {
            debug!("Page too large to capture, not caching");
            return Response::from_parts(parts, body);
        }
        Err(e) => {
            warn!("Failed to buffer response body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = match std::str::from_utf8(&bytes) {
        Ok(html) => html.to_string(),
        Err(_) => {
            debug!("Response body is not UTF-8, not caching");
            return Response::from_parts(parts, Body::from(bytes));
        }
    };

    let stored = {
        let cache = Arc::clone(&cache);
        tokio::task::spawn_blocking(move || cache.finish(handle, html)).await
    };
    let body = match stored {
        Ok(page) => Bytes::from(page),
        Err(e) => {
            warn!("Cache store task failed: {}", e);
            bytes
        }
    };

    parts.headers.remove(CONTENT_LENGTH);
    set_cache_headers(&mut parts.headers, &scope, "MISS");
    Response::from_parts(parts, Body::from(body))
}

/// Outcome of buffering a rendered body.
enum Captured {
    Complete(Bytes),
    /// The limit was crossed; the body replays what was read and streams the rest.
    TooLarge(Body),
}

async fn capture_body(body: Body, limit: usize) -> Result<Captured, axum::Error> {
    let mut chunks = body.into_data_stream();
    let mut buf = BytesMut::new();

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        buf.extend_from_slice(&chunk);
        if buf.len() > limit {
            let head = stream::once(async move { Ok::<_, axum::Error>(buf.freeze()) });
            return Ok(Captured::TooLarge(Body::from_stream(head.chain(chunks))));
        }
    }

    Ok(Captured::Complete(buf.freeze()))
}

/// Builds the engine's view of `request`.
///
/// Returns `None` when the viewer header is present but malformed; such
/// requests bypass the cache entirely.
pub fn page_request_from<B>(request: &Request<B>, default_host: &str) -> Option<PageRequest> {
    let uri = request.uri();
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let host = request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or(default_host)
        .to_string();

    let mut page = PageRequest::get(target, host).with_method(request.method().clone());

    if let Some(raw) = request.headers().get(VIEWER_HEADER) {
        let viewer = raw
            .to_str()
            .ok()
            .and_then(|v| ViewerId::parse(v).ok());
        match viewer {
            Some(viewer) => page = page.with_viewer(viewer),
            None => {
                debug!("Malformed {} header, bypassing cache", VIEWER_HEADER);
                return None;
            }
        }
    }

    if let Some(query) = uri.query() {
        for (name, _) in url::form_urlencoded::parse(query.as_bytes()) {
            match &*name {
                SEARCH_PARAM => page = page.with_search(true),
                PREVIEW_PARAM => page = page.with_preview(true),
                _ => {}
            }
        }
    }

    Some(page)
}

/// True when `Accept-Encoding` lists gzip without `q=0`.
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|coding| {
            let mut params = coding.split(';').map(str::trim);
            let name = params.next().unwrap_or_default();
            let refused = params.any(|p| {
                p.strip_prefix("q=")
                    .and_then(|q| q.parse::<f32>().ok())
                    .is_some_and(|q| q == 0.0)
            });
            (name.eq_ignore_ascii_case("gzip") || name == "*") && !refused
        })
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with("text/html"))
}

/// Marks a page response as cache-aware. Viewer copies must not be
/// reused by shared caches downstream.
fn set_cache_headers(headers: &mut HeaderMap, scope: &Scope, status: &'static str) {
    headers.insert(VARY, HeaderValue::from_static(VARY_VALUE));
    headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(status));
    if matches!(scope, Scope::User(_)) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("private"));
    }
}

/// Build a response from a stored artifact.
fn cached_response(artifact: CachedArtifact, scope: &Scope) -> Response {
    let mut response = Response::new(Body::from(artifact.body));
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    if artifact.gzip {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    set_cache_headers(headers, scope, "HIT");
    response
}
