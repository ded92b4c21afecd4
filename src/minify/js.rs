//! JavaScript Minifier
//!
//! Conservative minifier for inline `<script>` bodies. Strips comments and
//! redundant whitespace but keeps line breaks wherever automatic semicolon
//! insertion could depend on them. String, template and regex literals are
//! copied verbatim.

/// Keywords after which a `/` starts a regex literal rather than a division.
const REGEX_KEYWORDS: [&str; 14] = [
    "return", "typeof", "case", "do", "else", "in", "of", "delete", "void", "throw", "new",
    "instanceof", "yield", "await",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Gap {
    None,
    Space,
    Newline,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsMinifier;

impl JsMinifier {
    pub fn new() -> Self {
        Self
    }

    pub fn minify(&self, js: &str) -> String {
        let chars: Vec<char> = js.chars().collect();
        let mut out = String::with_capacity(js.len());
        let mut gap = Gap::None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            match c {
                '/' if next == Some('/') => {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                }
                '/' if next == Some('*') => {
                    let end = skip_block_comment(&chars, i + 2);
                    let spans_lines = chars[i..end].contains(&'\n');
                    gap = gap.max(if spans_lines { Gap::Newline } else { Gap::Space });
                    i = end;
                }
                '\n' | '\r' => {
                    gap = Gap::Newline;
                    i += 1;
                }
                c if c.is_whitespace() => {
                    gap = gap.max(Gap::Space);
                    i += 1;
                }
                '\'' | '"' | '`' => {
                    emit_gap(&mut out, gap, c);
                    gap = Gap::None;
                    i = copy_quoted(&chars, i, &mut out);
                }
                '/' if regex_allowed(&out) => {
                    emit_gap(&mut out, gap, c);
                    gap = Gap::None;
                    i = copy_regex(&chars, i, &mut out);
                }
                _ => {
                    emit_gap(&mut out, gap, c);
                    gap = Gap::None;
                    out.push(c);
                    i += 1;
                }
            }
        }

        out
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '\\' || !c.is_ascii()
}

fn emit_gap(out: &mut String, gap: Gap, next: char) {
    let Some(prev) = out.chars().last() else {
        return;
    };

    match gap {
        Gap::None => {}
        Gap::Newline => {
            if !matches!(prev, '{' | ';' | ',' | '(' | '[') && next != '}' {
                out.push('\n');
            }
        }
        Gap::Space => {
            let words = is_word(prev) && is_word(next);
            let doubled = (prev == '+' || prev == '-') && prev == next;
            if words || doubled {
                out.push(' ');
            }
        }
    }
}

/// A `/` begins a regex literal when the previous token cannot end an
/// expression.
fn regex_allowed(out: &str) -> bool {
    let trimmed = out.trim_end();
    let Some(prev) = trimmed.chars().last() else {
        return true;
    };

    if is_word(prev) {
        let word_start = trimmed
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_word(*c))
            .last()
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        return REGEX_KEYWORDS.contains(&&trimmed[word_start..]);
    }

    matches!(
        prev,
        '(' | ',' | '=' | ':' | '[' | '!' | '&' | '|' | '?' | '{' | '}' | ';' | '+' | '-' | '*'
            | '%' | '<' | '>' | '~' | '^'
    )
}

fn skip_block_comment(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() {
        if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

/// Copies a string or template literal starting at `start`, returning the
/// index after its closing delimiter.
fn copy_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
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
        } else if c == quote || (c == '\n' && quote != '`') {
            break;
        }
    }
    i
}

/// Copies a regex literal, honouring escapes and character classes.
fn copy_regex(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('/');
    let mut i = start + 1;
    let mut in_class = false;
    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            break;
        }
        out.push(c);
        i += 1;
        match c {
            '\\' => {
                if let Some(&escaped) = chars.get(i) {
                    out.push(escaped);
                    i += 1;
                }
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => break,
            _ => {}
        }
    }
    i
}
