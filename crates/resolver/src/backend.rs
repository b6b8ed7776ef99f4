//! Delegated-backend retrieval client.
//!
//! The backend strategy hands the normalized URL to a trusted retrieval
//! service that performs the fetch out-of-process, avoiding cross-origin
//! and certificate friction. The wire contract is JSON:
//! `{url, timeoutMs}` in, a partial metadata record out. Any non-2xx
//! status is treated uniformly as a strategy failure regardless of the
//! specific code.

use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use url::Url;

use crate::error::StrategyError;
use linkcard_core::{Error, PartialMeta};

/// Abstraction over the delegated retrieval collaborator.
///
/// The resolver goes through this seam so tests can substitute an
/// in-process fake.
#[async_trait]
pub trait BackendRetrieve: Send + Sync {
    /// Retrieve metadata for `url`, bounded by `timeout`.
    ///
    /// The timeout passed here is strictly shorter than the caller's
    /// overall strategy timeout, so the backend settles before the
    /// orchestrator gives up on it.
    async fn retrieve(&self, url: &Url, timeout: Duration) -> Result<PartialMeta, StrategyError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveRequest<'a> {
    url: &'a str,
    timeout_ms: u64,
}

/// HTTP client for the delegated retrieval endpoint.
pub struct HttpBackend {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpBackend {
    /// Create a backend client for the given endpoint.
    pub fn new(endpoint: impl Into<String>, user_agent: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::HttpClient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, endpoint: endpoint.into() })
    }

    /// The configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BackendRetrieve for HttpBackend {
    async fn retrieve(&self, url: &Url, timeout: Duration) -> Result<PartialMeta, StrategyError> {
        let start = Instant::now();
        let payload = RetrieveRequest { url: url.as_str(), timeout_ms: timeout.as_millis() as u64 };

        let response = self
            .http
            .post(&self.endpoint)
            .timeout(timeout)
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() { StrategyError::Timeout } else { StrategyError::Network(e.to_string()) }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StrategyError::Http { status: status.as_u16() });
        }

        let partial: PartialMeta = response
            .json()
            .await
            .map_err(|e| StrategyError::Decode(e.to_string()))?;

        tracing::debug!("backend retrieval for {} completed in {:?}", url, start.elapsed());

        Ok(partial.sanitized())
    }
}
