//! Minification Module
//!
//! Write-time transform applied to a captured page before it is stored:
//! HTML structure first, then inline `<style>` blocks, then inline
//! `<script>` blocks.

mod css;
mod html;
mod js;

use std::sync::LazyLock;

use regex::{Captures, Regex};

pub use css::CssMinifier;
pub use html::{HtmlMinifier, HtmlMinifyOptions};
pub use js::JsMinifier;

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b([^>]*)>(.*?)</style\s*>").expect("valid regex"));

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("valid regex")
});

static SRC_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)src\s*=").expect("valid regex"));

static TYPE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)type\s*=\s*["']?([^"'\s>]+)"#).expect("valid regex")
});

const SCRIPT_TYPES: [&str; 6] = [
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "text/ecmascript",
    "application/ecmascript",
    "module",
];

// == Options ==
/// Which minification stages run before a page is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinifyOptions {
    pub html: bool,
    pub css: bool,
    pub js: bool,
    /// Fine-grained HTML stages, used when `html` is on
    pub html_stages: HtmlMinifyOptions,
}

impl MinifyOptions {
    /// True when at least one stage is on.
    pub fn any_enabled(&self) -> bool {
        self.html || self.css || self.js
    }
}

// == Minifier ==
/// Owns one instance of each minifier and dispatches a page through them.
#[derive(Debug, Clone)]
pub struct Minifier {
    options: MinifyOptions,
    html: HtmlMinifier,
    css: CssMinifier,
    js: JsMinifier,
}

impl Minifier {
    pub fn new(options: MinifyOptions) -> Self {
        Self {
            html: HtmlMinifier::new(options.html_stages.clone()),
            css: CssMinifier::new(),
            js: JsMinifier::new(),
            options,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.options.any_enabled()
    }

    pub fn minify_html(&self, input: &str) -> String {
        self.html.minify(input)
    }

    pub fn minify_css(&self, input: &str) -> String {
        self.css.minify(input)
    }

    pub fn minify_js(&self, input: &str) -> String {
        self.js.minify(input)
    }

    /// Runs every enabled stage over `buffer` in order: HTML, CSS, JS.
    pub fn process(&self, buffer: &str) -> String {
        let mut out = if self.options.html {
            self.minify_html(buffer)
        } else {
            buffer.to_string()
        };

        if self.options.css {
            out = STYLE_BLOCK
                .replace_all(&out, |caps: &Captures| {
                    format!("<style{}>{}</style>", &caps[1], self.minify_css(&caps[2]))
                })
                .into_owned();
        }

        if self.options.js {
            out = SCRIPT_BLOCK
                .replace_all(&out, |caps: &Captures| {
                    let attrs = &caps[1];
                    if SRC_ATTR.is_match(attrs) || !is_script_type(attrs) {
                        return caps[0].to_string();
                    }
                    format!("<script{}>{}</script>", attrs, self.minify_js(&caps[2]))
                })
                .into_owned();
        }

        out
    }
}

/// True when the `type` attribute is absent or names JavaScript.
fn is_script_type(attrs: &str) -> bool {
    match TYPE_ATTR.captures(attrs) {
        None => true,
        Some(caps) => {
            let kind = caps[1].to_ascii_lowercase();
            SCRIPT_TYPES.contains(&kind.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minifier(html: bool, css: bool, js: bool) -> Minifier {
        Minifier::new(MinifyOptions {
            html,
            css,
            js,
            ..MinifyOptions::default()
        })
    }

    #[test]
    fn test_disabled_pipeline_is_identity() {
        let m = minifier(false, false, false);
        assert!(!m.is_enabled());
        let page = "<p>\n  <style> a { b: c } </style>\n</p>";
        assert_eq!(m.process(page), page);
    }

    #[test]
    fn test_inline_script_is_minified() {
        let m = minifier(false, false, true);
        assert_eq!(
            m.process("<script>var a=1;  </script>"),
            "<script>var a=1;</script>"
        );
    }

    #[test]
    fn test_external_script_is_untouched() {
        let m = minifier(false, false, true);
        let page = "<script src=\"/app.js\">var a=1;  </script>";
        assert_eq!(m.process(page), page);
    }

    #[test]
    fn test_data_src_is_not_external() {
        let m = minifier(false, false, true);
        assert_eq!(
            m.process("<script data-src=\"x\">var a = 1;</script>"),
            "<script data-src=\"x\">var a=1;</script>"
        );
    }

    #[test]
    fn test_non_js_script_types_untouched() {
        let m = minifier(false, false, true);
        let page = "<script type=\"text/template\">  <b> x </b>  </script>";
        assert_eq!(m.process(page), page);

        let module = "<script type=\"module\">import x from './x.js';  </script>";
        assert_eq!(
            m.process(module),
            "<script type=\"module\">import x from './x.js';</script>"
        );
    }

    #[test]
    fn test_inline_style_keeps_attributes() {
        let m = minifier(false, true, false);
        assert_eq!(
            m.process("<style media=\"print\">\n  a { color: red; }\n</style>"),
            "<style media=\"print\">a{color:red}</style>"
        );
    }

    #[test]
    fn test_full_pipeline() {
        let m = minifier(true, true, true);
        let page = "<html>\n  <head>\n    <style>\n      body { margin: 0; }\n    </style>\n    \
                    <script>\n      var greeting = 'hi';\n    </script>\n  </head>\n  \
                    <body>\n    <!-- nav -->\n    <p>Hello</p>\n  </body>\n</html>";
        assert_eq!(
            m.process(page),
            "<html><head><style>body{margin:0}</style><script>var greeting='hi';</script>\
             </head><body><p>Hello</p></body></html>"
        );
    }
}
