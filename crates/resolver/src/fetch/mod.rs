//! HTTP fetch pipeline for the direct resolution strategy.
//!
//! ### Page fetches
//! - GET with an HTML-preferring Accept header
//! - Body capped at `max_bytes`; overlong bodies are truncated, not
//!   rejected, since card metadata lives in `<head>`
//!
//! ### Existence probes
//! - HEAD requests with a short per-probe timeout, no body transfer
//! - Any non-success outcome is simply `false`, never an error

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::{Duration, Instant};

pub use url::{NormalizedUrl, normalize};

use crate::error::StrategyError;
use linkcard_core::Error;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "linkcard/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 2MB)
    pub max_bytes: usize,

    /// Request timeout (default: 8s); the resolver additionally applies
    /// the per-call strategy timeout on top of this.
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Timeout for a single favicon existence probe (default: 3s)
    pub probe_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "linkcard/0.1".to_string(),
            max_bytes: 2 * 1024 * 1024,
            timeout: Duration::from_millis(8000),
            max_redirects: 5,
            probe_timeout: Duration::from_millis(3000),
        }
    }
}

/// Abstraction over page fetching and existence probing.
///
/// The resolver and the favicon prober go through this seam so tests can
/// substitute in-process fakes with no network.
#[async_trait]
pub trait PageFetch: Send + Sync {
    /// Fetch a page body as text.
    async fn fetch_page(&self, url: &Url) -> Result<String, StrategyError>;

    /// Lightweight existence probe (no body transfer).
    async fn probe(&self, url: &Url) -> bool;
}

/// HTTP fetch client backing the direct strategy.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpClient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl PageFetch for FetchClient {
    async fn fetch_page(&self, url: &Url) -> Result<String, StrategyError> {
        let start = Instant::now();

        let response = self
            .http
            .get(url.as_str())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() { StrategyError::Timeout } else { StrategyError::Network(e.to_string()) }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StrategyError::Http { status: status.as_u16() });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() { StrategyError::Timeout } else { StrategyError::Network(e.to_string()) }
        })?;

        let capped = &bytes[..bytes.len().min(self.config.max_bytes)];
        let html = String::from_utf8_lossy(capped).into_owned();

        tracing::debug!(
            "fetched {} in {}ms ({} bytes)",
            url,
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(html)
    }

    async fn probe(&self, url: &Url) -> bool {
        let request = self.http.head(url.as_str()).timeout(self.config.probe_timeout);

        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
