//! Unified error types for linkcard.
//!
//! Only `Error::InvalidUrl` ever escapes the public `resolve` boundary;
//! everything downstream of normalization is recovered into a fallback
//! record rather than surfaced as an error.

/// Unified error types for the linkcard engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Input could not be normalized into a URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Failed to construct the HTTP client.
    #[error("HTTP_CLIENT: {0}")]
    HttpClient(String),

    /// Configuration load or validation failure.
    #[error("CONFIG: {0}")]
    Config(String),
}
