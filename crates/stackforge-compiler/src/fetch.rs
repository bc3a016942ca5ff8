//! Remote payload fetching

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, ETAG};
use reqwest::{Method, Response};
use thiserror::Error;
use tracing::{debug, warn};

/// Fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Error downloading {url}: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Error downloading {url}: too many HTTP redirects")]
    TooManyRedirects { url: String },

    #[error("Error downloading {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// A fetched payload.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Bytes,
    pub content_type: Option<String>,
    /// Entity tag reported by the server, if any.
    pub etag: Option<String>,
}

/// Source of remote payloads.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Cache validator (entity tag) for `url` without downloading the body.
    async fn validator(&self, url: &str) -> Result<Option<String>, FetchError>;

    /// Download `url`, following redirects.
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}

/// Fetch configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Redirects followed before giving up.
    pub max_redirects: usize,
    /// Retries after a network error or a server error response.
    pub max_retries: u32,
    /// Delay between retries.
    pub retry_delay: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP fetcher backed by reqwest.
///
/// Client errors (4xx) are permanent and fail immediately.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(concat!("stackforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn send(&self, method: Method, url: &str) -> Result<Response, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let retry = attempt <= self.config.max_retries;
            match self.client.request(method.clone(), url).send().await {
                Ok(response) if response.status().is_server_error() && retry => {
                    warn!(url = %url, status = %response.status(), attempt, "Server error, retrying");
                }
                Ok(response) if !response.status().is_success() => {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                    });
                }
                Ok(response) => {
                    if response.url().as_str() != url {
                        debug!(url = %url, location = %response.url(), "Redirected");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_redirect() => {
                    return Err(FetchError::TooManyRedirects {
                        url: url.to_string(),
                    });
                }
                Err(e) if retry => {
                    warn!(url = %url, error = %e, attempt, "Request failed, retrying");
                }
                Err(e) => {
                    return Err(FetchError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                    });
                }
            }
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }
}

fn header(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn validator(&self, url: &str) -> Result<Option<String>, FetchError> {
        match self.send(Method::HEAD, url).await {
            Ok(response) => Ok(header(&response, ETAG)),
            // Servers that reject HEAD still serve GET.
            Err(FetchError::Status { status, .. }) => {
                debug!(url = %url, status, "No validator available");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let response = self.send(Method::GET, url).await?;
        let content_type = header(&response, CONTENT_TYPE);
        let etag = header(&response, ETAG);
        let body = response.bytes().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: format!("Failed to read response: {}", e),
        })?;
        Ok(Fetched {
            body,
            content_type,
            etag,
        })
    }
}
