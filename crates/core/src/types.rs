//! Resolution data model: records, partial records, policies, and options.
//!
//! A `MetadataRecord` is the entire contract exposed to the card-rendering
//! layer. Absent fields mean "unknown" and are omitted from serialized
//! output; no field is ever an empty-string placeholder.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resolved descriptive metadata for a URL.
///
/// `url` always equals the normalized form used as the cache key. A
/// populated `error` field marks a best-effort fallback record produced
/// after all strategies and retries failed; callers may surface a manual
/// retry affordance but must not treat it as a hard failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    /// Normalized URL, identical to the cache key.
    pub url: String,
    /// Page title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Page description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Icon URL or glyph chosen for the card.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Favicon URL discovered by probing, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    /// Site name (og:site_name or derived).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    /// Open Graph preview image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    /// Last-failure message when the record is a terminal fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC3339 timestamp of when the record was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<String>,
}

impl MetadataRecord {
    /// Empty record for the given normalized URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            description: None,
            icon: None,
            favicon: None,
            site_name: None,
            og_image: None,
            error: None,
            fetched_at: None,
        }
    }
}

/// Partial metadata produced by one source (strategy result, registry
/// entry, or extractor output) before merge and enrichment.
///
/// Sources never store empty strings; a field is `Some` only when it has
/// real content, so the coalesce step can rely on `Option` alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
}

impl PartialMeta {
    /// Whether no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.icon.is_none()
            && self.favicon.is_none()
            && self.site_name.is_none()
            && self.og_image.is_none()
    }

    /// Whether both title and description are present.
    pub fn has_text_fields(&self) -> bool {
        self.title.is_some() && self.description.is_some()
    }

    /// Drop empty or whitespace-only values so `Some` always means real
    /// content. Applied to externally supplied partials (backend
    /// responses) before merging.
    pub fn sanitized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value.and_then(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
            })
        }

        Self {
            title: clean(self.title),
            description: clean(self.description),
            icon: clean(self.icon),
            favicon: clean(self.favicon),
            site_name: clean(self.site_name),
            og_image: clean(self.og_image),
        }
    }
}

/// How the two resolution strategies are orchestrated for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolvePolicy {
    /// Backend retrieval first; direct fetch only on backend failure.
    ApiFirst,
    /// Direct fetch first; backend consulted only to fill missing
    /// title/description, with direct fields winning on conflict.
    ClientFirst,
    /// Launch both concurrently and wait for both to settle; backend is
    /// primary when it succeeds, enriched by direct-result fields.
    #[default]
    Auto,
}

/// Per-call resolution options.
///
/// Engine-wide defaults come from [`crate::AppConfig`]; every field is
/// caller-overridable per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Wall-clock limit per strategy in milliseconds (default: 8000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Cache TTL for successful records in milliseconds (default: 30 min).
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Cache TTL for terminal-failure records in milliseconds
    /// (default: 60s — deliberately shorter than the success TTL so a
    /// transient outage is not cached for half an hour).
    #[serde(default = "default_failure_ttl_ms")]
    pub failure_ttl_ms: u64,

    /// Orchestration policy for this call (default: AUTO).
    #[serde(default)]
    pub policy: ResolvePolicy,

    /// Glyph used when no icon can be discovered.
    #[serde(default = "default_fallback_icon")]
    pub fallback_icon: String,

    /// Number of full-pipeline re-runs after a totally failed attempt
    /// (default: 1, so at most two attempts).
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,

    /// Force a fresh resolution, bypassing the cache read.
    #[serde(default)]
    pub force_refresh: bool,
}

fn default_timeout_ms() -> u64 {
    8_000
}

fn default_cache_ttl_ms() -> u64 {
    1_800_000
}

fn default_failure_ttl_ms() -> u64 {
    60_000
}

fn default_fallback_icon() -> String {
    "🔗".to_string()
}

fn default_retry_budget() -> u32 {
    1
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
            failure_ttl_ms: default_failure_ttl_ms(),
            policy: ResolvePolicy::default(),
            fallback_icon: default_fallback_icon(),
            retry_budget: default_retry_budget(),
            force_refresh: false,
        }
    }
}

impl ResolveOptions {
    /// Strategy timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Success-record TTL as a `Duration`.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Failure-record TTL as a `Duration`.
    pub fn failure_ttl(&self) -> Duration {
        Duration::from_millis(self.failure_ttl_ms)
    }
}
