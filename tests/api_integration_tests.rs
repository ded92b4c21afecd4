//! Integration Tests for the page cache server
//!
//! Drives full request/response cycles through the router: capture, read
//! path, viewer isolation and the admin API.

use std::collections::HashMap;
use std::io::Read;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use flate2::read::GzDecoder;
use page_cache::{create_router, AppState, Config};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const HOST: &str = "example.com";
const TOKEN: &str = "test-token";

// == Helper Functions ==

fn create_test_app(extra: &[(&str, &str)]) -> (TempDir, Router) {
    let mut env = vec![("SITE_HOST", HOST)];
    env.extend_from_slice(extra);
    create_app_with(&env)
}

/// App with only a cache root and admin token set, plus `env`.
fn create_app_with(env: &[(&str, &str)]) -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let mut env: HashMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    env.insert(
        "CACHE_ROOT".to_string(),
        dir.path().join("cache").display().to_string(),
    );
    env.insert("ADMIN_TOKEN".to_string(), TOKEN.to_string());

    let config = Config::from_lookup(|key| env.get(key).cloned());
    let state = AppState::from_config(&config);
    (dir, create_router(state))
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn page(uri: &str) -> axum::http::request::Builder {
    Request::builder().uri(uri).header("host", HOST)
}

fn admin(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", TOKEN))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn cache_status(response: &Response) -> Option<&str> {
    response
        .headers()
        .get("x-page-cache")
        .and_then(|v| v.to_str().ok())
}

fn gunzip(bytes: &[u8]) -> String {
    let mut out = String::new();
    GzDecoder::new(bytes).read_to_string(&mut out).unwrap();
    out
}

// == Capture and Read Path ==

#[tokio::test]
async fn test_first_visit_misses_then_hits() {
    let (_dir, app) = create_test_app(&[]);

    let first = send(&app, page("/about/").body(Body::empty()).unwrap()).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(cache_status(&first), Some("MISS"));
    let rendered = body_text(first).await;
    assert!(rendered.contains("<!-- Cached by page_cache on"));
    assert!(rendered.contains("for anonymous visitors -->"));

    let second = send(&app, page("/about/").body(Body::empty()).unwrap()).await;
    assert_eq!(cache_status(&second), Some("HIT"));
    assert!(second.headers().get("content-encoding").is_none());
    assert_eq!(body_text(second).await, rendered);
}

#[tokio::test]
async fn test_hit_prefers_gzip_when_accepted() {
    let (_dir, app) = create_test_app(&[]);

    let first = send(&app, page("/blog/").body(Body::empty()).unwrap()).await;
    let rendered = body_text(first).await;

    let hit = send(
        &app,
        page("/blog/")
            .header("accept-encoding", "gzip, deflate")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(cache_status(&hit), Some("HIT"));
    assert_eq!(hit.headers()["content-encoding"], "gzip");
    assert_eq!(gunzip(&body_bytes(hit).await), rendered);
}

#[tokio::test]
async fn test_minified_page_is_served_as_stored() {
    let (_dir, app) = create_test_app(&[
        ("MINIFY_HTML", "true"),
        ("MINIFY_CSS", "true"),
        ("MINIFY_JS", "true"),
    ]);

    let first = send(&app, page("/min/").body(Body::empty()).unwrap()).await;
    let rendered = body_text(first).await;
    assert!(!rendered.contains("\n  <h1>"));
    assert!(rendered.contains("body{font-family:sans-serif;margin:2em}"));
    assert!(rendered.contains("<!-- Cached by page_cache on"));

    let second = send(&app, page("/min/").body(Body::empty()).unwrap()).await;
    assert_eq!(cache_status(&second), Some("HIT"));
    assert_eq!(body_text(second).await, rendered);
}

#[tokio::test]
async fn test_gzip_disabled_serves_raw() {
    let (_dir, app) = create_test_app(&[("ENABLE_GZIP", "false")]);

    send(&app, page("/plain/").body(Body::empty()).unwrap()).await;
    let hit = send(
        &app,
        page("/plain/")
            .header("accept-encoding", "gzip")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(cache_status(&hit), Some("HIT"));
    assert!(hit.headers().get("content-encoding").is_none());
}

// == Eligibility ==

#[tokio::test]
async fn test_admin_path_is_not_cached() {
    let (dir, app) = create_test_app(&[]);

    let response = send(&app, page("/wp-admin/foo").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cache_status(&response).is_none());
    assert!(!body_text(response).await.contains("Cached by"));

    let html_files = std::fs::read_dir(dir.path().join("cache"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".html"))
        .count();
    assert_eq!(html_files, 0);
}

#[tokio::test]
async fn test_search_and_preview_are_not_cached() {
    let (_dir, app) = create_test_app(&[]);

    for uri in ["/?s=rust", "/post/?preview=true"] {
        let response = send(&app, page(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(cache_status(&response).is_none(), "{}", uri);
    }
}

#[tokio::test]
async fn test_cache_disabled_serves_live() {
    let (_dir, app) = create_test_app(&[("ENABLE_HTML_CACHE", "off")]);

    for _ in 0..2 {
        let response = send(&app, page("/about/").body(Body::empty()).unwrap()).await;
        assert!(cache_status(&response).is_none());
    }
}

// == Viewer Isolation ==

#[tokio::test]
async fn test_viewers_get_separate_copies() {
    let (_dir, app) = create_test_app(&[]);

    send(&app, page("/account/").body(Body::empty()).unwrap()).await;

    let viewer = || {
        page("/account/")
            .header("x-viewer-id", "alice")
            .body(Body::empty())
            .unwrap()
    };
    let first = send(&app, viewer()).await;
    assert_eq!(cache_status(&first), Some("MISS"));
    assert_eq!(first.headers()["cache-control"], "private");
    assert!(body_text(first).await.contains("for viewer alice -->"));

    let second = send(&app, viewer()).await;
    assert_eq!(cache_status(&second), Some("HIT"));
    assert_eq!(second.headers()["cache-control"], "private");
    assert_eq!(second.headers()["vary"], "accept-encoding, x-viewer-id");
    assert!(body_text(second).await.contains("for viewer alice -->"));

    let anonymous = send(&app, page("/account/").body(Body::empty()).unwrap()).await;
    assert_eq!(cache_status(&anonymous), Some("HIT"));
    assert!(anonymous.headers().get("cache-control").is_none());
    assert_eq!(anonymous.headers()["vary"], "accept-encoding, x-viewer-id");
    assert!(body_text(anonymous).await.contains("for anonymous visitors -->"));
}

#[tokio::test]
async fn test_malformed_viewer_bypasses_cache() {
    let (_dir, app) = create_test_app(&[]);

    let response = send(
        &app,
        page("/about/")
            .header("x-viewer-id", "../../etc")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cache_status(&response).is_none());
}

// == Admin API ==

#[tokio::test]
async fn test_admin_without_token_is_rejected() {
    let (_dir, app) = create_test_app(&[]);

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/admin/cache/clear-all")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_clear_page_forces_rerender() {
    let (_dir, app) = create_test_app(&[]);

    send(&app, page("/about/").body(Body::empty()).unwrap()).await;
    send(
        &app,
        page("/about/")
            .header("x-viewer-id", "bob")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    let response = send(
        &app,
        admin(
            "/admin/cache/clear-page",
            r#"{"url":"https://example.com/about/"}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["removed"], 4);

    let again = send(&app, page("/about/").body(Body::empty()).unwrap()).await;
    assert_eq!(cache_status(&again), Some("MISS"));
}

#[tokio::test]
async fn test_clear_bare_path_with_default_site_host() {
    let (_dir, app) = create_app_with(&[]);
    let local = || {
        Request::builder()
            .uri("/about/")
            .header("host", "localhost:3000")
            .body(Body::empty())
            .unwrap()
    };

    let first = send(&app, local()).await;
    assert_eq!(cache_status(&first), Some("MISS"));

    let response = send(&app, admin("/admin/cache/clear-page", r#"{"url":"/about/"}"#)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["removed"], 2);

    let again = send(&app, local()).await;
    assert_eq!(cache_status(&again), Some("MISS"));
}

#[tokio::test]
async fn test_default_port_in_host_header_shares_the_page() {
    let (_dir, app) = create_test_app(&[]);

    let first = send(
        &app,
        Request::builder()
            .uri("/ports/")
            .header("host", "Example.com:443")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(cache_status(&first), Some("MISS"));

    let second = send(&app, page("/ports/").body(Body::empty()).unwrap()).await;
    assert_eq!(cache_status(&second), Some("HIT"));
}

#[tokio::test]
async fn test_clear_page_rejects_empty_url() {
    let (_dir, app) = create_test_app(&[]);

    let response = send(&app, admin("/admin/cache/clear-page", r#"{"url":""}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_all() {
    let (_dir, app) = create_test_app(&[]);

    for uri in ["/a/", "/b/", "/c/"] {
        send(&app, page(uri).body(Body::empty()).unwrap()).await;
    }

    let response = send(&app, admin("/admin/cache/clear-all", "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["removed"], 6);
    assert!(json.get("url").is_none());

    let again = send(&app, page("/b/").body(Body::empty()).unwrap()).await;
    assert_eq!(cache_status(&again), Some("MISS"));
}

#[tokio::test]
async fn test_content_changed_clears_canonical_page() {
    let (_dir, app) = create_test_app(&[]);

    send(&app, page("/post-9/").body(Body::empty()).unwrap()).await;
    send(&app, page("/other/").body(Body::empty()).unwrap()).await;

    let response = send(
        &app,
        admin(
            "/admin/cache/content-changed",
            r#"{"resource_id":"post:9","url":"/post-9/"}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let changed = send(&app, page("/post-9/").body(Body::empty()).unwrap()).await;
    assert_eq!(cache_status(&changed), Some("MISS"));
    let untouched = send(&app, page("/other/").body(Body::empty()).unwrap()).await;
    assert_eq!(cache_status(&untouched), Some("HIT"));
}

// == Stats and Health ==

#[tokio::test]
async fn test_stats_track_activity() {
    let (_dir, app) = create_test_app(&[]);

    send(&app, page("/s/").body(Body::empty()).unwrap()).await;
    send(&app, page("/s/").body(Body::empty()).unwrap()).await;

    let response = send(&app, Request::builder().uri("/stats").body(Body::empty()).unwrap()).await;
    let json = body_json(response).await;
    assert_eq!(json["stored"], 1);
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
}

#[tokio::test]
async fn test_health_reports_storage() {
    let (_dir, app) = create_test_app(&[]);

    let response = send(&app, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["storage_writable"], true);
}
