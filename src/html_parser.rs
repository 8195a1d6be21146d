use crate::css;
use crate::dom::{DocumentTree, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Page,
    Stylesheet,
    Script,
    Image,
    Font,
}

impl ResourceType {
    /// Output subfolder for this category; pages live at the project root.
    pub fn subfolder(&self) -> &'static str {
        match self {
            ResourceType::Page => "",
            ResourceType::Stylesheet => "css",
            ResourceType::Script => "js",
            ResourceType::Image => "images",
            ResourceType::Font => "fonts",
        }
    }

    pub fn default_extension(&self) -> &'static str {
        match self {
            ResourceType::Page => "html",
            ResourceType::Stylesheet => "css",
            ResourceType::Script => "js",
            ResourceType::Image => "jpg",
            ResourceType::Font => "woff",
        }
    }

    /// Stem used when a URL has no usable last path segment.
    pub fn fallback_stem(&self) -> &'static str {
        match self {
            ResourceType::Page => "index",
            ResourceType::Stylesheet | ResourceType::Script => "main",
            ResourceType::Image => "image",
            ResourceType::Font => "font",
        }
    }
}

/// Where in a document a reference was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSite {
    /// `<link href>`, `<script src>`, `<img src>`.
    Attribute { node: NodeId, attr: &'static str },
    /// A `url()` inside an element's `style` attribute.
    StyleAttribute { node: NodeId },
    /// A `url()` or `@import` inside an inline `<style>` block.
    InlineStyle { node: NodeId },
    /// A `url()` or `@import` inside a downloaded stylesheet.
    Stylesheet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    pub site: ReferenceSite,
    pub raw_url: String,
    pub resource_type: ResourceType,
}

/// An inline `<style>` or `<script>` block that will be moved into the
/// per-document aggregate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineBlock {
    pub node: NodeId,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub references: Vec<ResourceReference>,
    pub inline_styles: Vec<InlineBlock>,
    pub inline_scripts: Vec<InlineBlock>,
    /// `href` of the first `<base>` element, if any.
    pub base_href: Option<String>,
}

const JAVASCRIPT_TYPES: &[&str] = &[
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "text/ecmascript",
    "application/ecmascript",
    "text/jscript",
];

const CLIENT_RENDERING_INDICATORS: &[&str] = &[
    "react",
    "vue",
    "angular",
    "next.js",
    "nuxt",
    "__next_data__",
    "app-root",
    "ng-app",
];

#[derive(Clone, Default)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }

    /// Walks the document once and returns every resource reference in
    /// document order, plus the inline blocks that will be aggregated.
    /// Nothing is fetched or resolved here.
    pub fn extract_references(&self, document: &DocumentTree) -> Extraction {
        let mut extraction = Extraction::default();

        for node in document.descendants() {
            let Some(name) = document.element_name(node) else {
                continue;
            };

            match name {
                "base" => {
                    if extraction.base_href.is_none() {
                        if let Some(href) = document.attr(node, "href") {
                            extraction.base_href = Some(href.to_string());
                        }
                    }
                }
                "link" => {
                    if let (Some(href), Some(rel)) =
                        (document.attr(node, "href"), document.attr(node, "rel"))
                    {
                        if is_stylesheet_rel(rel) {
                            self.push_attribute(
                                &mut extraction,
                                node,
                                "href",
                                href,
                                ResourceType::Stylesheet,
                            );
                        }
                    }
                }
                "script" => {
                    if let Some(src) = document.attr(node, "src") {
                        self.push_attribute(&mut extraction, node, "src", src, ResourceType::Script);
                    } else if is_classic_script(document.attr(node, "type")) {
                        let content = document.text_content(node);
                        let content = content.trim();
                        if !content.is_empty() && !content.starts_with("<!--") {
                            extraction.inline_scripts.push(InlineBlock {
                                node,
                                content: content.to_string(),
                            });
                        }
                    }
                }
                "style" => {
                    let content = document.text_content(node);
                    let content = content.trim();
                    if !content.is_empty() {
                        for css_url in css::scan_urls(content) {
                            extraction.references.push(ResourceReference {
                                site: ReferenceSite::InlineStyle { node },
                                raw_url: css_url.raw,
                                resource_type: css_url.kind,
                            });
                        }
                        extraction.inline_styles.push(InlineBlock {
                            node,
                            content: content.to_string(),
                        });
                    }
                }
                "img" => {
                    if let Some(src) = document.attr(node, "src") {
                        self.push_attribute(&mut extraction, node, "src", src, ResourceType::Image);
                    }
                }
                _ => {}
            }

            // Background images from inline styles
            if let Some(style) = document.attr(node, "style") {
                self.extract_background_images_from_css(style, node, &mut extraction.references);
            }
        }

        tracing::debug!(
            "Extracted {} references, {} inline style blocks, {} inline scripts",
            extraction.references.len(),
            extraction.inline_styles.len(),
            extraction.inline_scripts.len()
        );

        extraction
    }

    fn push_attribute(
        &self,
        extraction: &mut Extraction,
        node: NodeId,
        attr: &'static str,
        value: &str,
        resource_type: ResourceType,
    ) {
        if value.trim().is_empty() {
            return;
        }
        extraction.references.push(ResourceReference {
            site: ReferenceSite::Attribute { node, attr },
            raw_url: value.trim().to_string(),
            resource_type,
        });
    }

    pub fn extract_background_images_from_css(
        &self,
        style: &str,
        node: NodeId,
        references: &mut Vec<ResourceReference>,
    ) {
        for css_url in css::scan_urls(style) {
            references.push(ResourceReference {
                site: ReferenceSite::StyleAttribute { node },
                raw_url: css_url.raw,
                resource_type: ResourceType::Image,
            });
        }
    }

    /// References inside a downloaded stylesheet (second-order discovery).
    pub fn extract_stylesheet_references(&self, css_text: &str) -> Vec<ResourceReference> {
        css::scan_urls(css_text)
            .into_iter()
            .map(|css_url| ResourceReference {
                site: ReferenceSite::Stylesheet,
                raw_url: css_url.raw,
                resource_type: css_url.kind,
            })
            .collect()
    }
}

fn is_stylesheet_rel(rel: &str) -> bool {
    rel.split_ascii_whitespace()
        .any(|token| token.eq_ignore_ascii_case("stylesheet"))
}

fn is_classic_script(script_type: Option<&str>) -> bool {
    match script_type.map(str::trim) {
        None | Some("") => true,
        Some(t) => JAVASCRIPT_TYPES.iter().any(|js| t.eq_ignore_ascii_case(js)),
    }
}

/// Markers of a client-rendered page. The page is still mirrored as static
/// markup; nothing is executed.
pub fn detect_client_rendering(html: &str) -> Vec<&'static str> {
    let lower = html.to_lowercase();
    CLIENT_RENDERING_INDICATORS
        .iter()
        .copied()
        .filter(|indicator| lower.contains(indicator))
        .collect()
}
