//! Path Rewriter: replaces every resolved reference with the local path
//! assigned by the registry, relative to the file that contains it.

use std::cell::Cell;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::css::{self, CssEdit, CssUnit, CssUrl};
use crate::dom::DocumentTree;
use crate::html_parser::{Extraction, ReferenceSite};
use crate::registry::{
    ResourceRegistry, INDEX_PATH, INLINE_CSS_PATH, INLINE_JS_PATH, PLACEHOLDER_IMAGE_PATH,
};
use crate::url_normalizer::{resolve, Origin};

/// What happens to references that point at another host.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ForeignPolicy {
    /// Leave foreign references exactly as written.
    #[default]
    Keep,
    /// Remove `<link>`/`<script>` elements and `@import` rules that load
    /// foreign resources and point every other foreign reference at a local
    /// placeholder image.
    Strip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenDocument {
    pub html: String,
    pub inline_css: Option<String>,
    pub inline_js: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Replacement {
    Unchanged,
    Path(String),
    Remove,
}

pub struct PathRewriter<'a> {
    registry: &'a ResourceRegistry,
    policy: ForeignPolicy,
    placeholder_used: Cell<bool>,
}

impl<'a> PathRewriter<'a> {
    pub fn new(registry: &'a ResourceRegistry, policy: ForeignPolicy) -> Self {
        Self {
            registry,
            policy,
            placeholder_used: Cell::new(false),
        }
    }

    /// Whether any reference was pointed at the placeholder image, in which
    /// case the caller must emit it.
    pub fn placeholder_used(&self) -> bool {
        self.placeholder_used.get()
    }

    /// Rewrites the root document in place and serializes it.
    ///
    /// `base` is the URL the document's references resolve against (the
    /// final URL of the page, or its `<base href>`). Inline `<style>` and
    /// `<script>` blocks are removed and their contents returned as the
    /// aggregate files, in document order.
    pub fn rewrite_document(
        &self,
        document: &mut DocumentTree,
        extraction: &Extraction,
        base: &Url,
    ) -> RewrittenDocument {
        let mut rewritten_styles = HashSet::new();

        for reference in &extraction.references {
            match &reference.site {
                ReferenceSite::Attribute { node, attr } => {
                    let owns_element =
                        matches!(document.element_name(*node), Some("link") | Some("script"));
                    match self.replacement(&reference.raw_url, base, INDEX_PATH, owns_element) {
                        Replacement::Path(path) => document.set_attr(*node, attr, &path),
                        Replacement::Remove => {
                            tracing::debug!("Removing element loading {}", reference.raw_url);
                            document.detach(*node);
                        }
                        Replacement::Unchanged => {}
                    }
                }
                ReferenceSite::StyleAttribute { node } => {
                    if !rewritten_styles.insert(*node) {
                        continue;
                    }
                    if let Some(style) = document.attr(*node, "style").map(str::to_string) {
                        let style = css::rewrite_urls(&style, |css_url| {
                            self.css_replacement(css_url, base, INDEX_PATH)
                        });
                        document.set_attr(*node, "style", &style);
                    }
                }
                // Rewritten with the block contents below.
                ReferenceSite::InlineStyle { .. } | ReferenceSite::Stylesheet => {}
            }
        }

        let bases: Vec<_> = document
            .elements_named("base")
            .filter(|node| document.attr(*node, "href").is_some())
            .collect();
        for node in bases {
            document.detach(node);
        }

        let inline_css = self.aggregate_styles(document, extraction, base);
        let inline_js = aggregate_scripts(document, extraction);

        RewrittenDocument {
            html: document.serialize(),
            inline_css,
            inline_js,
        }
    }

    fn aggregate_styles(
        &self,
        document: &mut DocumentTree,
        extraction: &Extraction,
        base: &Url,
    ) -> Option<String> {
        if extraction.inline_styles.is_empty() {
            return None;
        }

        let mut blocks = Vec::with_capacity(extraction.inline_styles.len());
        for block in &extraction.inline_styles {
            let content = css::rewrite_urls(&block.content, |css_url| {
                self.css_replacement(css_url, base, INLINE_CSS_PATH)
            });
            blocks.push(format!("/* Inline style block */\n{}\n", content));
            document.detach(block.node);
        }

        let href = relative_path(INDEX_PATH, INLINE_CSS_PATH);
        let link = document.create_element("link", &[("rel", "stylesheet"), ("href", href.as_str())]);
        let head = document
            .find_first("head")
            .or_else(|| document.find_first("html"))
            .unwrap_or(document.root());
        document.append_child(head, link);

        Some(blocks.join("\n\n"))
    }

    /// Rewrites a downloaded stylesheet relative to its own location.
    pub fn rewrite_stylesheet(&self, unit: &mut CssUnit) {
        let base = unit.base_url.clone();
        let location = unit.location.clone();
        unit.rewrite(|css_url| self.css_replacement(css_url, &base, &location));
    }

    // An @import owns its rule the way <link> owns its element.
    fn css_replacement(&self, css_url: &CssUrl, base: &Url, from: &str) -> Option<CssEdit> {
        let owns_rule = css_url.rule.is_some();
        match self.replacement(&css_url.raw, base, from, owns_rule) {
            Replacement::Path(path) => Some(CssEdit::Url(path)),
            Replacement::Remove => {
                tracing::debug!("Removing @import of {}", css_url.raw);
                Some(CssEdit::DropRule)
            }
            Replacement::Unchanged => None,
        }
    }

    fn replacement(&self, raw: &str, base: &Url, from: &str, owns_element: bool) -> Replacement {
        let Some(resolved) = resolve(raw, base, self.registry.site_domain()) else {
            return Replacement::Unchanged;
        };

        match resolved.origin {
            Origin::NonFetchable => Replacement::Unchanged,
            Origin::SameOrigin => match self.registry.get(&resolved) {
                Some(entry) if entry.status().is_terminal() => {
                    let mut path = relative_path(from, entry.local_path());
                    if let Some(fragment) = resolved.fragment() {
                        path.push('#');
                        path.push_str(fragment);
                    }
                    Replacement::Path(path)
                }
                _ => Replacement::Unchanged,
            },
            Origin::Foreign => match self.policy {
                ForeignPolicy::Keep => Replacement::Unchanged,
                ForeignPolicy::Strip if owns_element => Replacement::Remove,
                ForeignPolicy::Strip => {
                    self.placeholder_used.set(true);
                    Replacement::Path(relative_path(from, PLACEHOLDER_IMAGE_PATH))
                }
            },
        }
    }
}

fn aggregate_scripts(document: &mut DocumentTree, extraction: &Extraction) -> Option<String> {
    if extraction.inline_scripts.is_empty() {
        return None;
    }

    let mut blocks = Vec::with_capacity(extraction.inline_scripts.len());
    for block in &extraction.inline_scripts {
        blocks.push(format!("/* Inline script block */\n{}\n", block.content));
        document.detach(block.node);
    }

    let src = relative_path(INDEX_PATH, INLINE_JS_PATH);
    let script = document.create_element("script", &[("src", src.as_str())]);
    let body = document
        .find_first("body")
        .or_else(|| document.find_first("html"))
        .unwrap_or(document.root());
    document.append_child(body, script);

    Some(blocks.join("\n\n"))
}

/// Path of `to_file` as seen from the directory containing `from_file`.
/// Both are relative to the project root; the result always uses `/`.
pub fn relative_path(from_file: &str, to_file: &str) -> String {
    let from_dir = Path::new(from_file).parent().unwrap_or(Path::new(""));
    match pathdiff::diff_paths(to_file, from_dir) {
        Some(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        None => to_file.to_string(),
    }
}

/// A 1×1 transparent PNG.
pub fn placeholder_png() -> image::ImageResult<Vec<u8>> {
    let pixel = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(pixel).write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;
    Ok(bytes)
}
