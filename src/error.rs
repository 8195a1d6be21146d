use std::time::Duration;

use thiserror::Error;

/// Failure to retrieve a single resource.
///
/// Recorded on the registry entry and reported in the run's failure summary;
/// never fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("aborted: {0}")]
    Aborted(String),
}

impl TransportError {
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(timeout)
        } else if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
            }
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Errors that abort a mirroring run.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid target URL {url}: {source}")]
    InvalidTarget {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("target URL {0} has no host")]
    MissingHost(String),

    /// The page itself could not be fetched, so there is nothing to mirror.
    #[error("failed to fetch root document {url}: {source}")]
    RootDocument {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to encode placeholder image: {0}")]
    Placeholder(#[from] image::ImageError),
}
