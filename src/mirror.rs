//! The mirroring pipeline: fetch the root page, extract and register its
//! references, fetch everything, rewrite, then produce the output files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

use crate::config::MirrorConfig;
use crate::css::CssUnit;
use crate::dom::DocumentTree;
use crate::downloader::{FetchOrchestrator, FetchSettings, FetchSummary};
use crate::error::{MirrorError, TransportError};
use crate::file_manager::FileManager;
use crate::html_parser::{detect_client_rendering, HtmlParser, ResourceType};
use crate::registry::{
    ContentKind, FailureRecord, FetchOutcome, FetchStatus, ResourceRegistry, INDEX_PATH,
    INLINE_CSS_PATH, INLINE_JS_PATH, PLACEHOLDER_IMAGE_PATH,
};
use crate::rewriter::{placeholder_png, ForeignPolicy, PathRewriter};
use crate::transport::{HttpTransport, Transport};
use crate::url_normalizer::{authority, normalize, normalize_target, resolve};

/// Successfully fetched resources per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub stylesheets: usize,
    pub scripts: usize,
    pub images: usize,
    pub fonts: usize,
    pub failed: usize,
}

/// The complete output of one run, held in memory.
#[derive(Debug, Clone)]
pub struct MirrorSnapshot {
    pub target: Url,
    /// URL of the root document after redirects.
    pub final_url: Url,
    /// Local path → file contents, ordered by path.
    pub files: BTreeMap<String, Vec<u8>>,
    pub failures: Vec<FailureRecord>,
    pub indicators: Vec<String>,
    pub counts: ResourceCounts,
    pub fetch: FetchSummary,
}

impl MirrorSnapshot {
    pub fn file(&self, local_path: &str) -> Option<&[u8]> {
        self.files.get(local_path).map(|bytes| bytes.as_slice())
    }

    pub fn text(&self, local_path: &str) -> Option<String> {
        self.file(local_path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

#[derive(Debug, Clone)]
pub struct MirrorReport {
    pub project_dir: PathBuf,
    pub files_written: usize,
    pub failures: Vec<FailureRecord>,
    pub indicators: Vec<String>,
    pub counts: ResourceCounts,
}

impl MirrorReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct WebsiteMirror {
    transport: Arc<dyn Transport>,
    settings: FetchSettings,
    foreign_policy: ForeignPolicy,
    html_parser: HtmlParser,
}

impl WebsiteMirror {
    pub fn new(config: &MirrorConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(&config.user_agent)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: &MirrorConfig) -> Self {
        Self {
            transport,
            settings: config.fetch_settings(),
            foreign_policy: config.foreign_policy,
            html_parser: HtmlParser::new(),
        }
    }

    /// Normalizes user input into the target URL.
    pub fn parse_target(input: &str) -> Result<Url, MirrorError> {
        let normalized = normalize_target(input);
        let url = Url::parse(&normalized).map_err(|source| MirrorError::InvalidTarget {
            url: normalized.clone(),
            source,
        })?;
        if authority(&url).is_none() {
            return Err(MirrorError::MissingHost(normalized));
        }
        Ok(url)
    }

    /// Runs the whole engine without touching the disk.
    pub async fn snapshot(&self, target: &str) -> Result<MirrorSnapshot, MirrorError> {
        let target = Self::parse_target(target)?;
        let site_domain =
            authority(&target).ok_or_else(|| MirrorError::MissingHost(target.to_string()))?;
        tracing::info!("Mirroring {} (site domain {})", target, site_domain);

        let registry = ResourceRegistry::new(site_domain);
        if self.foreign_policy == ForeignPolicy::Strip {
            registry.reserve(PLACEHOLDER_IMAGE_PATH);
        }
        let orchestrator = FetchOrchestrator::new(self.transport.clone(), self.settings);

        let root = registry.register_root(&target);
        orchestrator.fetch_one(&registry, &root).await;
        let page = match root.outcome() {
            Some(FetchOutcome::Succeeded(resource)) => resource.clone(),
            Some(FetchOutcome::Failed(error)) => {
                return Err(MirrorError::RootDocument {
                    url: target.to_string(),
                    source: error.clone(),
                })
            }
            None => {
                return Err(MirrorError::RootDocument {
                    url: target.to_string(),
                    source: TransportError::Aborted("root document was not fetched".to_string()),
                })
            }
        };

        let html = page.text();
        let indicators: Vec<String> = detect_client_rendering(&html)
            .into_iter()
            .map(str::to_string)
            .collect();
        if !indicators.is_empty() {
            tracing::warn!(
                "Page looks client-rendered ({}); mirroring static markup only",
                indicators.join(", ")
            );
        }

        let mut document = DocumentTree::parse(&html);
        let extraction = self.html_parser.extract_references(&document);
        let document_base = extraction
            .base_href
            .as_deref()
            .and_then(|href| normalize(href, &page.final_url).ok())
            .unwrap_or_else(|| page.final_url.clone());

        for reference in &extraction.references {
            let Some(resolved) = resolve(&reference.raw_url, &document_base, registry.site_domain())
            else {
                continue;
            };
            if registry.register(&resolved, reference.resource_type).is_none() {
                tracing::debug!("Not registering {} ({:?})", resolved.url, resolved.origin);
            }
        }

        let fetch = orchestrator.fetch_all(&registry).await;

        let rewriter = PathRewriter::new(&registry, self.foreign_policy);
        let rewritten = rewriter.rewrite_document(&mut document, &extraction, &document_base);

        let mut files = BTreeMap::new();
        files.insert(INDEX_PATH.to_string(), rewritten.html.into_bytes());
        if let Some(css) = rewritten.inline_css {
            files.insert(INLINE_CSS_PATH.to_string(), css.into_bytes());
        }
        if let Some(js) = rewritten.inline_js {
            files.insert(INLINE_JS_PATH.to_string(), js.into_bytes());
        }

        let mut counts = ResourceCounts::default();
        for entry in registry.entries_in_order() {
            if entry.seq() == root.seq() {
                continue;
            }
            if entry.status() == FetchStatus::Failed {
                counts.failed += 1;
                continue;
            }
            let Some(resource) = entry.fetched() else {
                continue;
            };

            let bytes = match entry.resource_type() {
                ResourceType::Stylesheet => {
                    let mut unit =
                        CssUnit::new(resource.text(), resource.final_url.clone(), entry.local_path());
                    rewriter.rewrite_stylesheet(&mut unit);
                    unit.text.into_bytes()
                }
                _ => match entry.content_kind() {
                    Some(ContentKind::Text) => resource.text().into_bytes(),
                    _ => resource.bytes.clone(),
                },
            };

            match entry.resource_type() {
                ResourceType::Stylesheet => counts.stylesheets += 1,
                ResourceType::Script => counts.scripts += 1,
                ResourceType::Image => counts.images += 1,
                ResourceType::Font => counts.fonts += 1,
                ResourceType::Page => {}
            }
            files.insert(entry.local_path().to_string(), bytes);
        }

        if rewriter.placeholder_used() {
            files.insert(PLACEHOLDER_IMAGE_PATH.to_string(), placeholder_png()?);
        }

        let failures = registry.failures();
        tracing::info!(
            "Mirrored {} files with {} failures",
            files.len(),
            failures.len()
        );

        Ok(MirrorSnapshot {
            target,
            final_url: page.final_url,
            files,
            failures,
            indicators,
            counts,
            fetch,
        })
    }

    /// Runs the engine and writes the result under `project_dir`.
    pub async fn mirror(&self, target: &str, project_dir: &Path) -> anyhow::Result<MirrorReport> {
        let snapshot = self.snapshot(target).await?;

        let file_manager = FileManager::new(project_dir)?;
        let written = file_manager.write_snapshot(&snapshot)?;

        Ok(MirrorReport {
            project_dir: project_dir.to_path_buf(),
            files_written: written.len(),
            failures: snapshot.failures,
            indicators: snapshot.indicators,
            counts: snapshot.counts,
        })
    }
}
