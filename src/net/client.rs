//! `reqwest`-backed transport.

use super::{HttpTransport, StreamResponse};
use crate::constants::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, DEFAULT_USER_AGENT};
use crate::core::UpdaterError;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Longest response body kept in an [`UpdaterError::HttpStatus`].
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct NetOptions {
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Idle read timeout
    pub read_timeout: Duration,
    /// `User-Agent` header value
    pub user_agent: String,
}

impl Default for NetOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Production HTTP transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: Client,
}

impl ReqwestTransport {
    /// Build a transport with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::Configuration`] if the TLS backend cannot be
    /// initialized.
    pub fn new(options: &NetOptions) -> Result<Self, UpdaterError> {
        let inner = Client::builder()
            .connect_timeout(options.connect_timeout)
            .read_timeout(options.read_timeout)
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(|e| UpdaterError::config("http", format!("failed to build HTTP client: {e}")))?;
        Ok(Self { inner })
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, UpdaterError> {
        debug!("GET {}", url);
        let response = self.inner.get(url).send().await.map_err(|e| map_reqwest(url, e))?;
        let status = response.status();

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(UpdaterError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_text(&self, url: &str) -> Result<String, UpdaterError> {
        let response = self.send(url).await?;
        response.text().await.map_err(|e| map_reqwest(url, e))
    }

    async fn open_stream(&self, url: &str) -> Result<StreamResponse, UpdaterError> {
        let response = self.send(url).await?;
        let content_length = response.content_length();
        let owned_url = url.to_string();
        let stream = response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(move |e| map_reqwest(&owned_url, e));
        Ok(StreamResponse {
            content_length,
            stream: Box::pin(stream),
        })
    }
}

fn map_reqwest(url: &str, error: reqwest::Error) -> UpdaterError {
    if error.is_decode() {
        return UpdaterError::parse(url, error);
    }
    // connect, timeout, body and request errors all mean the host could not
    // be talked to reliably; the cycle retries them
    UpdaterError::Network {
        url: url.to_string(),
        message: error.to_string(),
    }
}
