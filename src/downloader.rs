use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;

use crate::error::TransportError;
use crate::html_parser::{HtmlParser, ResourceType};
use crate::registry::{FetchOutcome, RegistryEntry, ResourceRegistry};
use crate::transport::Transport;
use crate::url_normalizer::{authority, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    pub max_concurrent: usize,
    pub per_host_concurrent: usize,
    pub fetch_timeout: Duration,
    pub run_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            per_host_concurrent: 4,
            fetch_timeout: Duration::from_secs(30),
            run_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub waves: usize,
    pub attempted: usize,
    /// Entries first registered while scanning downloaded stylesheets.
    pub discovered: usize,
    /// Entries settled as failed by the run deadline.
    pub aborted: usize,
}

/// Drives every pending registry entry through the transport.
///
/// Work proceeds in waves: fetch everything pending, then scan the
/// stylesheets that just arrived for further references, and repeat until a
/// wave discovers nothing new. Within a wave fetches run concurrently,
/// bounded globally and per host.
pub struct FetchOrchestrator {
    transport: Arc<dyn Transport>,
    settings: FetchSettings,
    html_parser: HtmlParser,
    host_limits: DashMap<String, Arc<Semaphore>>,
}

impl FetchOrchestrator {
    pub fn new(transport: Arc<dyn Transport>, settings: FetchSettings) -> Self {
        Self {
            transport,
            settings,
            html_parser: HtmlParser::new(),
            host_limits: DashMap::new(),
        }
    }

    /// Fetches one entry if this caller wins its claim. Returns whether a
    /// fetch was performed.
    pub async fn fetch_one(&self, registry: &ResourceRegistry, entry: &RegistryEntry) -> bool {
        if !entry.try_claim() {
            return false;
        }

        let limit = self.host_limit(entry);
        let outcome = match limit.acquire().await {
            Ok(_permit) => self.fetch_with_timeout(entry).await,
            Err(_) => FetchOutcome::Failed(TransportError::Aborted("host limiter closed".to_string())),
        };

        registry.mark_fetched(entry, outcome);
        true
    }

    async fn fetch_with_timeout(&self, entry: &RegistryEntry) -> FetchOutcome {
        let timeout = self.settings.fetch_timeout;
        match tokio::time::timeout(timeout, self.transport.fetch(entry.url(), timeout)).await {
            Ok(Ok(resource)) => FetchOutcome::Succeeded(resource),
            Ok(Err(e)) => FetchOutcome::Failed(e),
            Err(_) => FetchOutcome::Failed(TransportError::Timeout(timeout)),
        }
    }

    fn host_limit(&self, entry: &RegistryEntry) -> Arc<Semaphore> {
        let host = authority(entry.url()).unwrap_or_default();
        let permits = self.settings.per_host_concurrent.max(1);
        self.host_limits
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(permits)))
            .clone()
    }

    /// Fetches everything pending, then keeps going until stylesheet scanning
    /// stops turning up new resources or the run deadline passes. Outstanding
    /// entries at the deadline are settled as failed.
    pub async fn fetch_all(&self, registry: &ResourceRegistry) -> FetchSummary {
        let mut summary = FetchSummary::default();

        let run = self.drive(registry, &mut summary);
        if tokio::time::timeout(self.settings.run_timeout, run).await.is_err() {
            tracing::warn!(
                "Run timeout of {:?} exceeded, aborting outstanding fetches",
                self.settings.run_timeout
            );
            summary.aborted = registry.abort_outstanding("run timeout exceeded");
        }

        tracing::info!(
            "Fetch phase finished: {} fetched in {} waves, {} discovered in stylesheets",
            summary.attempted,
            summary.waves,
            summary.discovered
        );
        summary
    }

    async fn drive(&self, registry: &ResourceRegistry, summary: &mut FetchSummary) {
        let mut scanned = HashSet::new();
        loop {
            let attempted = self.fetch_wave(registry).await;
            if attempted > 0 {
                summary.waves += 1;
                summary.attempted += attempted;
            }

            let discovered = self.discover_stylesheet_references(registry, &mut scanned);
            summary.discovered += discovered;

            if discovered == 0 && registry.pending().is_empty() {
                break;
            }
        }
    }

    async fn fetch_wave(&self, registry: &ResourceRegistry) -> usize {
        let pending = registry.pending();
        if pending.is_empty() {
            return 0;
        }
        tracing::debug!("Fetching wave of {} resources", pending.len());

        let performed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        stream::iter(pending)
            .for_each_concurrent(self.settings.max_concurrent.max(1), |entry| {
                let performed = performed.clone();
                async move {
                    if self.fetch_one(registry, &entry).await {
                        performed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    }
                }
            })
            .await;

        performed.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Second-order discovery: registers references found in stylesheets
    /// fetched since the last scan. Each stylesheet is scanned once, in
    /// registration order, against its final (post-redirect) URL.
    pub fn discover_stylesheet_references(
        &self,
        registry: &ResourceRegistry,
        scanned: &mut HashSet<usize>,
    ) -> usize {
        let before = registry.len();

        for entry in registry.entries_in_order() {
            if entry.resource_type() != ResourceType::Stylesheet {
                continue;
            }
            let Some(resource) = entry.fetched() else {
                continue;
            };
            if !scanned.insert(entry.seq()) {
                continue;
            }

            let css_text = resource.text();
            for reference in self.html_parser.extract_stylesheet_references(&css_text) {
                let Some(resolved) =
                    resolve(&reference.raw_url, &resource.final_url, registry.site_domain())
                else {
                    continue;
                };
                if !resolved.is_same_origin() {
                    tracing::debug!("Not fetching foreign reference {}", resolved.url);
                    continue;
                }
                registry.register(&resolved, reference.resource_type);
            }
        }

        registry.len() - before
    }
}
