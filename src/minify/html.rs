//! HTML Minifier
//!
//! Structural HTML minification. Zones that must survive byte-for-byte
//! (server directives, conditional comments, raw-text elements) are swapped
//! for nonce-tagged placeholders before any stage runs and swapped back at
//! the end.

use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::{Captures, Regex};

static SERVER_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<\?.*?\?>|<%.*?%>").expect("valid regex"));

static CONDITIONAL_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--\[if[^\]]*\]>.*?<!\[endif\]-->|<!--<!\[endif\]-->").expect("valid regex")
});

/// Comments and raw-text elements in one alternation, so whichever opens
/// first owns the text up to its own terminator.
static COMMENT_OR_RAW_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<!--.*?-->|<script\b[^>]*>.*?</script\s*>|<pre\b[^>]*>.*?</pre\s*>|<textarea\b[^>]*>.*?</textarea\s*>",
    )
    .expect("valid regex")
});

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">[ \t\n\r\x0C]+<").expect("valid regex"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\n\r\x0C]{2,}").expect("valid regex"));

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<___PAGECACHE_([0-9a-f]{16})_([A-Za-z0-9+/=]*)_([0-9a-f]{16})___>")
        .expect("valid regex")
});

/// Placeholders are shaped like a tag so whitespace next to a protected zone
/// is treated the same as whitespace next to any other tag.
const PLACEHOLDER_PREFIX: &str = "<___PAGECACHE_";

const ASCII_WHITESPACE: [char; 5] = [' ', '\t', '\n', '\r', '\x0C'];

// == Options ==
/// Individually switchable HTML stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlMinifyOptions {
    pub remove_comments: bool,
    pub remove_whitespace: bool,
    pub remove_linebreaks: bool,
    pub preserve_conditional_comments: bool,
    pub preserve_server_script: bool,
    /// Keep `<script>`, `<pre>` and `<textarea>` contents untouched
    pub preserve_raw_text: bool,
}

impl Default for HtmlMinifyOptions {
    fn default() -> Self {
        Self {
            remove_comments: true,
            remove_whitespace: true,
            remove_linebreaks: true,
            preserve_conditional_comments: true,
            preserve_server_script: true,
            preserve_raw_text: true,
        }
    }
}

// == HTML Minifier ==
#[derive(Debug, Clone, Default)]
pub struct HtmlMinifier {
    options: HtmlMinifyOptions,
}

impl HtmlMinifier {
    pub fn new(options: HtmlMinifyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &HtmlMinifyOptions {
        &self.options
    }

    /// Minifies `html`, leaving every protected zone byte-identical.
    ///
    /// Passes repeat until the text stops changing, so stripping one comment
    /// can never leave behind a new one. Every pass only shortens the text.
    pub fn minify(&self, html: &str) -> String {
        let mut out = html.to_string();
        loop {
            let next = self.minify_once(&out);
            if next == out {
                return next;
            }
            out = next;
        }
    }

    fn minify_once(&self, html: &str) -> String {
        if html.is_empty() {
            return String::new();
        }

        let opts = &self.options;
        let zones = ZoneGuard::for_input(html);
        let mut out = html.to_string();

        if opts.preserve_server_script {
            out = zones.protect(&SERVER_DIRECTIVE, &out);
        }
        if opts.preserve_conditional_comments {
            out = zones.protect(&CONDITIONAL_COMMENT, &out);
        }

        if opts.preserve_raw_text {
            out = COMMENT_OR_RAW_TEXT
                .replace_all(&out, |caps: &Captures| {
                    let zone = &caps[0];
                    if !zone.starts_with("<!--") {
                        zones.placeholder(zone)
                    } else if opts.remove_comments && !is_conditional_comment(zone) {
                        String::new()
                    } else {
                        zone.to_string()
                    }
                })
                .into_owned();
        } else if opts.remove_comments {
            out = COMMENT
                .replace_all(&out, |caps: &Captures| {
                    if is_conditional_comment(&caps[0]) {
                        caps[0].to_string()
                    } else {
                        String::new()
                    }
                })
                .into_owned();
        }

        if opts.remove_whitespace {
            out = BETWEEN_TAGS.replace_all(&out, "><").into_owned();
            out = out.trim_start_matches(ASCII_WHITESPACE).to_string();
            out = WHITESPACE_RUN.replace_all(&out, " ").into_owned();
        }

        if opts.remove_linebreaks {
            out.retain(|c| !matches!(c, '\n' | '\r' | '\t'));
        }

        zones.restore(&out)
    }
}

fn is_conditional_comment(comment: &str) -> bool {
    let body = comment
        .strip_prefix("<!--")
        .unwrap_or(comment)
        .trim_start_matches(ASCII_WHITESPACE);
    body.starts_with("[if") || body.starts_with("<!") || body.starts_with('>')
}

// == Zone Guard ==
/// Issues and resolves placeholders for one minification call.
///
/// The nonce is chosen so that no placeholder prefix built from it occurs in
/// the input, and restore ignores placeholders carrying any other nonce.
struct ZoneGuard {
    nonce: String,
}

impl ZoneGuard {
    fn for_input(input: &str) -> Self {
        loop {
            let nonce = format!("{:016x}", rand::random::<u64>());
            let marker = format!("{}{}", PLACEHOLDER_PREFIX, nonce);
            if !input.contains(&marker) {
                return Self { nonce };
            }
        }
    }

    fn protect(&self, pattern: &Regex, text: &str) -> String {
        pattern
            .replace_all(text, |caps: &Captures| self.placeholder(&caps[0]))
            .into_owned()
    }

    fn placeholder(&self, zone: &str) -> String {
        format!(
            "{}{}_{}_{}___>",
            PLACEHOLDER_PREFIX,
            self.nonce,
            STANDARD.encode(zone.as_bytes()),
            self.nonce
        )
    }

    /// Replaces placeholders until none of ours remain. Zones protected
    /// inside other zones come back on a later pass.
    fn restore(&self, text: &str) -> String {
        let mut out = text.to_string();
        loop {
            let mut replaced = false;
            let next = PLACEHOLDER
                .replace_all(&out, |caps: &Captures| {
                    match self.decode(caps) {
                        Some(original) => {
                            replaced = true;
                            original
                        }
                        None => caps[0].to_string(),
                    }
                })
                .into_owned();
            out = next;
            if !replaced {
                return out;
            }
        }
    }

    fn decode(&self, caps: &Captures) -> Option<String> {
        if &caps[1] != self.nonce.as_str() || &caps[3] != self.nonce.as_str() {
            return None;
        }
        let bytes = STANDARD.decode(&caps[2]).ok()?;
        String::from_utf8(bytes).ok()
    }
}
