//! CSS Minifier
//!
//! Minifies the body of an inline `<style>` block: drops comments, collapses
//! whitespace and removes it where the grammar makes it meaningless.

/// Characters that never need a space on either side.
const TIGHT: [char; 5] = ['{', '}', ';', ',', '>'];

#[derive(Debug, Clone, Copy, Default)]
pub struct CssMinifier;

impl CssMinifier {
    pub fn new() -> Self {
        Self
    }

    pub fn minify(&self, css: &str) -> String {
        let chars: Vec<char> = css.chars().collect();
        let mut out = String::with_capacity(css.len());
        let mut pending_space = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if c == '/' && chars.get(i + 1) == Some(&'*') {
                i = skip_comment(&chars, i + 2);
                pending_space = true;
                continue;
            }

            if c.is_whitespace() {
                pending_space = true;
                i += 1;
                continue;
            }

            if pending_space && needs_space(&out, c) {
                out.push(' ');
            }
            pending_space = false;

            if c == '"' || c == '\'' {
                i = copy_string(&chars, i, &mut out);
                continue;
            }

            if c == '}' && out.ends_with(';') {
                out.pop();
            }
            out.push(c);
            i += 1;
        }

        out
    }
}

fn needs_space(out: &str, next: char) -> bool {
    match out.chars().last() {
        None => false,
        Some(prev) => !(TIGHT.contains(&prev) || prev == ':' || TIGHT.contains(&next)),
    }
}

/// Returns the index just past the closing `*/`, or the end of input.
fn skip_comment(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() {
        if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

/// Copies the quoted string starting at `start` verbatim and returns the
/// index after its closing quote.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    out.push(quote);
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        if c == '\\' {
            if let Some(&escaped) = chars.get(i) {
                out.push(escaped);
                i += 1;
            }
        } else if c == quote {
            break;
        }
    }
    i
}
