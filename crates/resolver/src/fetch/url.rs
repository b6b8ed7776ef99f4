//! URL normalization for stable cache keys.

use linkcard_core::Error;
use url::Url;

/// A parsed URL together with its canonical cache-key string.
///
/// Two inputs differing only by a missing scheme or a redundant trailing
/// slash normalize to the identical key.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedUrl {
    /// Parsed form, used for joins and host inspection.
    pub url: Url,
    /// Canonical string form, used as the cache key and as the record's
    /// `url` field.
    pub key: String,
}

impl NormalizedUrl {
    /// Hostname of the URL, empty for hostless URLs.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Bare domain with any leading `www.` stripped.
    pub fn domain(&self) -> String {
        let host = self.host();
        host.strip_prefix("www.").unwrap_or(host).to_string()
    }

    /// Origin of the URL (`scheme://host[:port]/`) for favicon probing.
    pub fn origin(&self) -> Url {
        let mut origin = self.url.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin
    }
}

/// Normalize a URL string into a stable cache key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Remove fragment (#...)
/// 4. Strip one trailing `/` when the path is exactly `/` and there is
///    no query string
///
/// The host is lowercased by the URL parser itself. Normalization is
/// idempotent: `normalize(normalize(u).key)` yields the same key.
///
/// # Errors
///
/// Returns `Error::InvalidUrl` for empty, unparseable, or
/// non-http(s)-scheme input. This is the only error that rejects a
/// `resolve` call outright.
pub fn normalize(input: &str) -> Result<NormalizedUrl, Error> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("empty URL".into()));
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
    }

    if parsed.host_str().is_none() {
        return Err(Error::InvalidUrl("missing host".into()));
    }

    parsed.set_fragment(None);

    let mut key = parsed.to_string();
    if parsed.path() == "/" && parsed.query().is_none() && key.ends_with('/') {
        key.pop();
    }

    Ok(NormalizedUrl { url: parsed, key })
}
