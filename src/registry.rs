//! Resource registry: one entry per distinct absolute URL.
//!
//! The registry assigns every same-origin resource a local path at
//! registration time and arbitrates who fetches it. Entries are created with
//! insert-if-absent on a sharded map and claimed with a compare-and-set on
//! the entry's status, so identical URLs never fetch twice while unrelated
//! resources proceed independently.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use url::Url;

use crate::error::TransportError;
use crate::html_parser::ResourceType;
use crate::transport::FetchedResource;
use crate::url_normalizer::{registry_key, ResolvedUrl};

pub const INDEX_PATH: &str = "index.html";
pub const INLINE_CSS_PATH: &str = "css/inline.css";
pub const INLINE_JS_PATH: &str = "js/inline.js";
pub const PLACEHOLDER_IMAGE_PATH: &str = "images/placeholder.png";

const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

impl FetchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FetchStatus::Succeeded | FetchStatus::Failed)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => FetchStatus::Pending,
            1 => FetchStatus::InFlight,
            2 => FetchStatus::Succeeded,
            _ => FetchStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Binary,
}

impl ContentKind {
    /// Anything whose content type does not mention one of the text markers,
    /// including a missing header, is binary.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let content_type = content_type.unwrap_or("").to_lowercase();
        if ["text", "html", "css", "javascript", "json"]
            .iter()
            .any(|marker| content_type.contains(marker))
        {
            ContentKind::Text
        } else {
            ContentKind::Binary
        }
    }
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Succeeded(FetchedResource),
    Failed(TransportError),
}

#[derive(Debug)]
pub struct RegistryEntry {
    url: Url,
    local_path: String,
    resource_type: ResourceType,
    seq: usize,
    status: AtomicU8,
    outcome: OnceLock<FetchOutcome>,
}

impl RegistryEntry {
    fn new(url: Url, local_path: String, resource_type: ResourceType, seq: usize) -> Self {
        Self {
            url,
            local_path,
            resource_type,
            seq,
            status: AtomicU8::new(FetchStatus::Pending as u8),
            outcome: OnceLock::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn local_path(&self) -> &str {
        &self.local_path
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Registration order.
    pub fn seq(&self) -> usize {
        self.seq
    }

    pub fn status(&self) -> FetchStatus {
        FetchStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn outcome(&self) -> Option<&FetchOutcome> {
        self.outcome.get()
    }

    pub fn fetched(&self) -> Option<&FetchedResource> {
        match self.outcome.get() {
            Some(FetchOutcome::Succeeded(resource)) => Some(resource),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self.outcome.get() {
            Some(FetchOutcome::Failed(error)) => Some(error),
            _ => None,
        }
    }

    pub fn content_kind(&self) -> Option<ContentKind> {
        self.fetched()
            .map(|resource| ContentKind::from_content_type(resource.content_type.as_deref()))
    }

    /// Pending → in-flight. Exactly one caller wins for the lifetime of the
    /// entry; that caller owns the fetch.
    pub fn try_claim(&self) -> bool {
        self.status
            .compare_exchange(
                FetchStatus::Pending as u8,
                FetchStatus::InFlight as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn settle(&self, outcome: FetchOutcome) -> bool {
        let status = match outcome {
            FetchOutcome::Succeeded(_) => FetchStatus::Succeeded,
            FetchOutcome::Failed(_) => FetchStatus::Failed,
        };
        if self.outcome.set(outcome).is_err() {
            return false;
        }
        self.status.store(status as u8, Ordering::Release);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub url: String,
    pub reason: String,
}

pub struct ResourceRegistry {
    site_domain: String,
    entries: DashMap<String, Arc<RegistryEntry>>,
    names: Mutex<HashSet<String>>,
    next_seq: AtomicUsize,
}

impl ResourceRegistry {
    pub fn new(site_domain: impl Into<String>) -> Self {
        let registry = Self {
            site_domain: site_domain.into(),
            entries: DashMap::new(),
            names: Mutex::new(HashSet::new()),
            next_seq: AtomicUsize::new(0),
        };
        registry.reserve(INDEX_PATH);
        registry.reserve(INLINE_CSS_PATH);
        registry.reserve(INLINE_JS_PATH);
        registry
    }

    pub fn site_domain(&self) -> &str {
        &self.site_domain
    }

    /// Marks a local path as taken so no remote resource is assigned to it.
    pub fn reserve(&self, path: &str) {
        self.lock_names().insert(path.to_string());
    }

    /// Registers the root document at the fixed `index.html` path.
    pub fn register_root(&self, url: &Url) -> Arc<RegistryEntry> {
        let key = registry_key(url);
        match self.entries.entry(key) {
            Entry::Occupied(occupied) => occupied.get().clone(),
            Entry::Vacant(vacant) => {
                let mut url = url.clone();
                url.set_fragment(None);
                let entry = Arc::new(RegistryEntry::new(
                    url,
                    INDEX_PATH.to_string(),
                    ResourceType::Page,
                    self.next_seq.fetch_add(1, Ordering::SeqCst),
                ));
                vacant.insert(entry.clone());
                entry
            }
        }
    }

    /// Idempotent: the first call for an absolute URL creates the entry and
    /// assigns its local path; every later call returns that same entry.
    /// Foreign and non-fetchable URLs are never registered.
    pub fn register(
        &self,
        resolved: &ResolvedUrl,
        resource_type: ResourceType,
    ) -> Option<Arc<RegistryEntry>> {
        if !resolved.is_same_origin() {
            return None;
        }

        let key = resolved.key();
        if let Some(existing) = self.entries.get(&key) {
            return Some(existing.value().clone());
        }

        match self.entries.entry(key) {
            Entry::Occupied(occupied) => Some(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let mut url = resolved.url.clone();
                url.set_fragment(None);
                let suggested = suggested_name(&url);
                let local_path = self.assign_local_path(resource_type, &suggested);
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                tracing::debug!("Registered {} -> {}", url, local_path);

                let entry = Arc::new(RegistryEntry::new(url, local_path, resource_type, seq));
                vacant.insert(entry.clone());
                Some(entry)
            }
        }
    }

    pub fn get(&self, resolved: &ResolvedUrl) -> Option<Arc<RegistryEntry>> {
        self.entries.get(&resolved.key()).map(|e| e.value().clone())
    }

    /// Picks a free path under the category subfolder. Collisions within a
    /// category get `_1`, `_2`, ... in the order paths are requested.
    pub fn assign_local_path(&self, resource_type: ResourceType, suggested_name: &str) -> String {
        let (stem, extension) = split_name(&sanitize_filename(suggested_name), resource_type);
        let folder = resource_type.subfolder();
        let join = |name: String| {
            if folder.is_empty() {
                name
            } else {
                format!("{}/{}", folder, name)
            }
        };

        let mut names = self.lock_names();
        let mut candidate = join(format!("{}.{}", stem, extension));
        let mut suffix = 1;
        while names.contains(&candidate) {
            candidate = join(format!("{}_{}.{}", stem, suffix, extension));
            suffix += 1;
        }
        names.insert(candidate.clone());
        candidate
    }

    /// Records a fetch result. Only the first outcome for an entry sticks.
    pub fn mark_fetched(&self, entry: &RegistryEntry, outcome: FetchOutcome) {
        match &outcome {
            FetchOutcome::Succeeded(_) => tracing::debug!("Fetched {}", entry.url),
            FetchOutcome::Failed(error) => tracing::warn!("Failed to fetch {}: {}", entry.url, error),
        }
        entry.settle(outcome);
    }

    /// Entries still waiting to be fetched, in registration order.
    pub fn pending(&self) -> Vec<Arc<RegistryEntry>> {
        self.entries_in_order()
            .into_iter()
            .filter(|entry| entry.status() == FetchStatus::Pending)
            .collect()
    }

    /// Settles every non-terminal entry as failed. Used when the run-level
    /// deadline cancels outstanding fetches.
    pub fn abort_outstanding(&self, reason: &str) -> usize {
        let mut aborted = 0;
        for entry in self.entries_in_order() {
            if entry.status().is_terminal() {
                continue;
            }
            entry.try_claim();
            if entry.settle(FetchOutcome::Failed(TransportError::Aborted(reason.to_string()))) {
                aborted += 1;
            }
        }
        aborted
    }

    pub fn entries_in_order(&self) -> Vec<Arc<RegistryEntry>> {
        let mut entries: Vec<Arc<RegistryEntry>> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        self.entries_in_order()
            .into_iter()
            .filter_map(|entry| {
                entry.error().map(|error| FailureRecord {
                    url: entry.url.to_string(),
                    reason: error.to_string(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lock_names(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // The set is only ever inserted into, so a poisoned guard is still consistent.
        self.names.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Last non-empty path segment of the URL.
pub fn suggested_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("")
        .to_string()
}

pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' => c,
            _ => '_',
        })
        .collect();

    if sanitized.len() <= MAX_FILENAME_LEN {
        return sanitized;
    }

    match sanitized.rfind('.') {
        Some(dot) if sanitized.len() - dot < 16 => {
            let extension = &sanitized[dot..];
            format!("{}{}", &sanitized[..MAX_FILENAME_LEN - extension.len()], extension)
        }
        _ => sanitized[..MAX_FILENAME_LEN].to_string(),
    }
}

fn split_name(name: &str, resource_type: ResourceType) -> (String, String) {
    let name = name.trim_matches('.');
    if name.is_empty() {
        return (
            resource_type.fallback_stem().to_string(),
            resource_type.default_extension().to_string(),
        );
    }
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => {
            (stem.to_string(), extension.to_string())
        }
        _ => (name.to_string(), resource_type.default_extension().to_string()),
    }
}
