//! Shared helpers for the integration tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use page_mirror::{FetchedResource, MirrorConfig, TransportError, Transport, WebsiteMirror};

#[derive(Clone)]
enum Response {
    Body {
        bytes: Vec<u8>,
        content_type: Option<String>,
        final_url: Option<String>,
    },
    Error(TransportError),
}

/// In-memory transport answering from a fixed table and recording every
/// requested URL in call order.
#[derive(Default)]
pub struct StubTransport {
    responses: HashMap<String, Response>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(
            url.to_string(),
            Response::Body {
                bytes: body.into(),
                content_type: Some(content_type.to_string()),
                final_url: None,
            },
        );
        self
    }

    pub fn without_content_type(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(
            url.to_string(),
            Response::Body {
                bytes: body.into(),
                content_type: None,
                final_url: None,
            },
        );
        self
    }

    /// Serves `body` for `url` as if the request had been redirected to `final_url`.
    pub fn redirected(mut self, url: &str, final_url: &str, content_type: &str, body: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Response::Body {
                bytes: body.as_bytes().to_vec(),
                content_type: Some(content_type.to_string()),
                final_url: Some(final_url.to_string()),
            },
        );
        self
    }

    pub fn failing(mut self, url: &str, error: TransportError) -> Self {
        self.responses.insert(url.to_string(), Response::Error(error));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == url).count()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<FetchedResource, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());

        match self.responses.get(url.as_str()) {
            Some(Response::Body {
                bytes,
                content_type,
                final_url,
            }) => Ok(FetchedResource {
                bytes: bytes.clone(),
                content_type: content_type.clone(),
                final_url: match final_url {
                    Some(final_url) => Url::parse(final_url).unwrap(),
                    None => url.clone(),
                },
            }),
            Some(Response::Error(error)) => Err(error.clone()),
            None => Err(TransportError::Status { status: 404 }),
        }
    }
}

#[allow(dead_code)]
pub fn mirror_with(transport: Arc<StubTransport>, config: &MirrorConfig) -> WebsiteMirror {
    WebsiteMirror::with_transport(transport, config)
}
