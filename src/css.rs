//! Stylesheet reference scanning and rewriting.
//!
//! Scanning is regex based and never fails: text that does not look like a
//! `url()` or `@import` is left alone.

use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::html_parser::ResourceType;

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#)
            .expect("valid url() pattern")
    })
}

fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')"#).expect("valid @import pattern")
    })
}

fn font_face_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)@font-face\s*\{[^}]*\}").expect("valid @font-face pattern"))
}

/// One reference found in CSS text. `span` covers only the URL itself, not
/// the surrounding `url(` / quotes, so replacements keep the original quoting.
/// `rule` is set for `@import` references and covers the whole at-rule
/// including its terminating semicolon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssUrl {
    pub raw: String,
    pub span: Range<usize>,
    pub kind: ResourceType,
    pub rule: Option<Range<usize>>,
}

/// What to do with one scanned reference during a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssEdit {
    /// Replace the URL text, keeping its quoting.
    Url(String),
    /// Delete the enclosing `@import` rule. Plain `url()` references have
    /// no rule and are left untouched.
    DropRule,
}

/// Text of one stylesheet together with the URL its references resolve
/// against and the local file it will be written to.
#[derive(Debug, Clone)]
pub struct CssUnit {
    pub text: String,
    pub base_url: Url,
    pub location: String,
}

impl CssUnit {
    pub fn new(text: impl Into<String>, base_url: Url, location: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            base_url,
            location: location.into(),
        }
    }

    pub fn references(&self) -> Vec<CssUrl> {
        scan_urls(&self.text)
    }

    pub fn rewrite<F>(&mut self, edit: F)
    where
        F: FnMut(&CssUrl) -> Option<CssEdit>,
    {
        self.text = rewrite_urls(&self.text, edit);
    }
}

/// Every `url(...)` and `@import "..."` occurrence outside comments, in
/// source order.
pub fn scan_urls(css: &str) -> Vec<CssUrl> {
    let masked = mask_comments(css);
    let css = masked.as_str();

    let font_blocks: Vec<Range<usize>> = font_face_regex()
        .find_iter(css)
        .map(|m| m.range())
        .collect();

    let mut found = Vec::new();

    for cap in url_regex().captures_iter(css) {
        let Some(inner) = cap.get(1).or_else(|| cap.get(2)).or_else(|| cap.get(3)) else {
            continue;
        };
        let raw = inner.as_str().trim();
        if raw.is_empty() {
            continue;
        }

        let start = cap.get(0).map(|m| m.start()).unwrap_or(inner.start());
        let import_start = import_start(&css[..start]);
        let kind = if import_start.is_some() {
            ResourceType::Stylesheet
        } else if font_blocks.iter().any(|block| block.contains(&start)) || is_font_path(raw) {
            ResourceType::Font
        } else {
            ResourceType::Image
        };

        found.push(CssUrl {
            raw: raw.to_string(),
            span: inner.range(),
            kind,
            rule: import_start.map(|rule_start| rule_start..rule_end(css, inner.end())),
        });
    }

    for cap in import_regex().captures_iter(css) {
        if let (Some(whole), Some(inner)) = (cap.get(0), cap.get(1).or_else(|| cap.get(2))) {
            if inner.as_str().trim().is_empty() {
                continue;
            }
            found.push(CssUrl {
                raw: inner.as_str().trim().to_string(),
                span: inner.range(),
                kind: ResourceType::Stylesheet,
                rule: Some(whole.start()..rule_end(css, inner.end())),
            });
        }
    }

    found.sort_by_key(|u| u.span.start);
    found
}

/// Applies `edit` to each scanned reference; `None` leaves it as is.
pub fn rewrite_urls<F>(css: &str, mut edit: F) -> String
where
    F: FnMut(&CssUrl) -> Option<CssEdit>,
{
    let mut out = String::with_capacity(css.len());
    let mut last = 0;
    for css_url in scan_urls(css) {
        if css_url.span.start < last {
            continue;
        }
        match (edit(&css_url), &css_url.rule) {
            (Some(CssEdit::Url(replacement)), _) => {
                out.push_str(&css[last..css_url.span.start]);
                out.push_str(&replacement);
                last = css_url.span.end;
            }
            (Some(CssEdit::DropRule), Some(rule)) => {
                out.push_str(&css[last..rule.start.max(last)]);
                last = rule.end.max(last);
            }
            (Some(CssEdit::DropRule), None) | (None, _) => {}
        }
    }
    out.push_str(&css[last..]);
    out
}

/// Copy of `css` with every comment byte blanked out. Offsets are unchanged
/// and the result stays valid UTF-8 since only whole comments are replaced.
fn mask_comments(css: &str) -> String {
    let bytes = css.as_bytes();
    let mut masked = Vec::with_capacity(bytes.len());
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                masked.push(b);
                if b == b'\\' && i + 1 < bytes.len() {
                    masked.push(bytes[i + 1]);
                    i += 1;
                } else if b == q || b == b'\n' {
                    quote = None;
                }
            }
            None if b == b'/' && bytes.get(i + 1) == Some(&b'*') => {
                let end = css[i + 2..]
                    .find("*/")
                    .map(|offset| i + 2 + offset + 2)
                    .unwrap_or(bytes.len());
                masked.resize(masked.len() + (end - i), b' ');
                i = end;
                continue;
            }
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                }
                masked.push(b);
            }
        }
        i += 1;
    }

    String::from_utf8(masked).unwrap_or_else(|_| css.to_string())
}

/// Byte offset of the `@import` keyword when `before` ends with it.
fn import_start(before: &str) -> Option<usize> {
    let trimmed = before.trim_end();
    let start = trimmed.len().checked_sub(7)?;
    (trimmed.is_char_boundary(start) && trimmed[start..].eq_ignore_ascii_case("@import"))
        .then_some(start)
}

// An @import ends at the next semicolon; a missing one runs to the end.
fn rule_end(css: &str, from: usize) -> usize {
    css[from..]
        .find(';')
        .map(|offset| from + offset + 1)
        .unwrap_or(css.len())
}

fn is_font_path(raw: &str) -> bool {
    let path = raw.split(['?', '#']).next().unwrap_or(raw);
    let guess = mime_guess::from_path(Path::new(path));
    guess
        .iter()
        .any(|mime| mime.type_().as_str() == "font" || mime.subtype().as_str() == "vnd.ms-fontobject")
}
