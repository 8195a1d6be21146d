use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, redirect, Client, ClientBuilder};
use url::Url;

use crate::error::TransportError;

pub const DEFAULT_USER_AGENT: &str = "PageMirror/1.0";
const MAX_REDIRECTS: usize = 10;

/// Body of a successful fetch. `final_url` is the URL after redirects and
/// is the base for resolving references inside the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub final_url: Url,
}

impl FetchedResource {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Retrieves one URL. Implementations follow redirects and report the
/// final URL; retries, if any, belong here and not in the orchestrator.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedResource, TransportError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let client = ClientBuilder::new()
            .use_rustls_tls()
            .user_agent(user_agent)
            .cookie_store(true)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedResource, TransportError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;

        Ok(FetchedResource {
            bytes: bytes.to_vec(),
            content_type,
            final_url,
        })
    }
}
