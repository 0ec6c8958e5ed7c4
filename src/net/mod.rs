//! HTTP plumbing shared by every provider and the downloader.
//!
//! Providers never talk to `reqwest` directly. They go through the
//! [`HttpTransport`] trait so the whole pipeline can be driven by canned
//! responses in tests (see `test_utils::FakeTransport`).
//!
//! - [`client`] - the production [`ReqwestTransport`]
//! - [`json`] - JSON fetch helpers and URL building

pub mod client;
pub mod json;

pub use client::{NetOptions, ReqwestTransport};
pub use json::{api_url, fetch_json};

use crate::core::UpdaterError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of body chunks from an open download.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, UpdaterError>> + Send>>;

/// An open response whose body has not been read yet.
pub struct StreamResponse {
    /// `Content-Length` when the server sent one
    pub content_length: Option<u64>,
    /// Body chunks
    pub stream: ByteStream,
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Minimal HTTP surface the updater needs.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET a URL and return the body as text. Non-2xx statuses are
    /// reported as [`UpdaterError::HttpStatus`].
    async fn get_text(&self, url: &str) -> Result<String, UpdaterError>;

    /// GET a URL and return the body as a chunk stream once the status line
    /// and headers have been received.
    async fn open_stream(&self, url: &str) -> Result<StreamResponse, UpdaterError>;
}
