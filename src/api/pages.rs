//! Built-in site renderer.
//!
//! Stands in for the host application when the binary runs on its own: any
//! path renders a small HTML document, which the capture middleware then
//! caches like any other page.

use axum::{
    extract::Query,
    http::Uri,
    response::Html,
};
use std::collections::HashMap;

/// Handler for every path not claimed by the API.
pub async fn site_handler(uri: Uri, Query(params): Query<HashMap<String, String>>) -> Html<String> {
    let path = uri.path();
    let heading = match params.get("s") {
        Some(term) => format!("Search results for {}", escape(term)),
        None => format!("Page {}", escape(path)),
    };
    Html(render_page(&heading, path))
}

/// Renders a complete document around `heading`.
pub fn render_page(heading: &str, path: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         \x20 <meta charset=\"utf-8\">\n\
         \x20 <title>{heading}</title>\n\
         \x20 <style>\n    body {{ font-family: sans-serif; margin: 2em; }}\n  </style>\n\
         </head>\n\
         <body>\n\
         \x20 <!-- rendered by the built-in site -->\n\
         \x20 <h1>{heading}</h1>\n\
         \x20 <p>This page was rendered for <code>{path}</code>.</p>\n\
         \x20 <p>Repeat visits are answered from the page cache.</p>\n\
         \x20 <script>\n    document.body.dataset.rendered = 'yes';\n  </script>\n\
         </body>\n\
         </html>\n",
        heading = heading,
        path = escape(path),
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
