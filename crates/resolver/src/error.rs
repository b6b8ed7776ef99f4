//! Strategy-level failure types.
//!
//! A `StrategyError` never crosses the public `resolve` boundary: it is
//! recovered by falling through to the other strategy or the retry loop,
//! and at worst ends up as the `error` string of a terminal record.

/// Failure of one resolution strategy attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StrategyError {
    /// Network-level failure (DNS, connect, TLS, read).
    #[error("network error: {0}")]
    Network(String),

    /// The strategy exceeded its wall-clock timeout.
    #[error("timed out")]
    Timeout,

    /// Non-success HTTP status from the page or the backend.
    #[error("HTTP status {status}")]
    Http { status: u16 },

    /// Backend response body could not be decoded.
    #[error("backend decode error: {0}")]
    Decode(String),

    /// No backend endpoint is configured.
    #[error("backend not configured")]
    BackendDisabled,

    /// Every strategy within one pipeline attempt failed.
    #[error("all strategies failed: {0}")]
    AllFailed(String),
}
