//! In-memory [`HttpTransport`] with canned responses.

use crate::core::UpdaterError;
use crate::net::{HttpTransport, StreamResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A canned response for one URL.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    /// 200 with the given body
    Body(Vec<u8>),
    /// Non-2xx status with a body
    Status(u16, String),
    /// Connection failure
    Unreachable,
    /// 200 whose body stream yields `chunks` and then fails mid-transfer
    Interrupted(Vec<Vec<u8>>),
}

/// Transport that answers from a URL → response table and logs requests.
#[derive(Debug, Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, FakeResponse>>,
    requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    /// Empty transport; unknown URLs answer 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `url` to a JSON (or any text) body.
    #[must_use]
    pub fn with_json(self, url: &str, body: &str) -> Self {
        self.route(url, FakeResponse::Body(body.as_bytes().to_vec()));
        self
    }

    /// Route `url` to raw bytes.
    #[must_use]
    pub fn with_bytes(self, url: &str, body: &[u8]) -> Self {
        self.route(url, FakeResponse::Body(body.to_vec()));
        self
    }

    /// Route `url` to an arbitrary response.
    #[must_use]
    pub fn with_response(self, url: &str, response: FakeResponse) -> Self {
        self.route(url, response);
        self
    }

    /// Replace or add a route on a shared transport.
    pub fn route(&self, url: &str, response: FakeResponse) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// How many times `url` was requested.
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    fn lookup(&self, url: &str) -> FakeResponse {
        self.requests.lock().unwrap().push(url.to_string());
        self.routes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| FakeResponse::Status(404, format!("no route for {url}")))
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get_text(&self, url: &str) -> Result<String, UpdaterError> {
        match self.lookup(url) {
            FakeResponse::Body(body) => {
                String::from_utf8(body).map_err(|e| UpdaterError::parse(url, e))
            }
            FakeResponse::Status(status, body) => Err(UpdaterError::HttpStatus {
                url: url.to_string(),
                status,
                body,
            }),
            FakeResponse::Unreachable | FakeResponse::Interrupted(_) => Err(UpdaterError::Network {
                url: url.to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }

    async fn open_stream(&self, url: &str) -> Result<StreamResponse, UpdaterError> {
        match self.lookup(url) {
            FakeResponse::Body(body) => {
                let len = body.len() as u64;
                // split into a few chunks so hashing and progress see several updates
                let chunks: Vec<Result<Vec<u8>, UpdaterError>> =
                    body.chunks(7).map(|c| Ok(c.to_vec())).collect();
                Ok(StreamResponse {
                    content_length: Some(len),
                    stream: Box::pin(futures::stream::iter(chunks)),
                })
            }
            FakeResponse::Interrupted(chunks) => {
                let owned_url = url.to_string();
                let mut items: Vec<Result<Vec<u8>, UpdaterError>> =
                    chunks.into_iter().map(Ok).collect();
                items.push(Err(UpdaterError::Network {
                    url: owned_url,
                    message: "connection reset by peer".to_string(),
                }));
                Ok(StreamResponse {
                    content_length: None,
                    stream: Box::pin(futures::stream::iter(items)),
                })
            }
            FakeResponse::Status(status, body) => Err(UpdaterError::HttpStatus {
                url: url.to_string(),
                status,
                body,
            }),
            FakeResponse::Unreachable => Err(UpdaterError::Network {
                url: url.to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }
}
