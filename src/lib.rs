pub mod archive;
pub mod cli;
pub mod config;
pub mod css;
pub mod delivery;
pub mod dom;
pub mod downloader;
pub mod error;
pub mod file_manager;
pub mod html_parser;
pub mod mirror;
pub mod registry;
pub mod rewriter;
pub mod transport;
pub mod url_normalizer;

// Re-export main types for convenience
pub use cli::MirrorCommand;
pub use config::MirrorConfig;
pub use downloader::{FetchOrchestrator, FetchSettings, FetchSummary};
pub use error::{MirrorError, TransportError};
pub use file_manager::FileManager;
pub use html_parser::{HtmlParser, ResourceReference, ResourceType};
pub use mirror::{MirrorReport, MirrorSnapshot, ResourceCounts, WebsiteMirror};
pub use registry::{FailureRecord, RegistryEntry, ResourceRegistry};
pub use rewriter::{ForeignPolicy, PathRewriter};
pub use transport::{FetchedResource, HttpTransport, Transport};
