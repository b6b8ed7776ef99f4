//! Application configuration with layered loading.
//!
//! Configuration is assembled with figment from three sources:
//!
//! 1. Environment variables (LINKCARD_*)
//! 2. TOML config file (if LINKCARD_CONFIG_FILE set)
//! 3. Built-in defaults

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{ResolveOptions, ResolvePolicy};

mod validation;

pub use validation::ConfigError;

/// Engine-wide configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LINKCARD_*)
/// 2. TOML config file (if LINKCARD_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// User-Agent string for HTTP requests.
    ///
    /// Set via LINKCARD_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Endpoint of the delegated retrieval service used by the backend
    /// strategy. When unset, only the direct strategy runs.
    ///
    /// Set via LINKCARD_BACKEND_ENDPOINT environment variable.
    #[serde(default)]
    pub backend_endpoint: Option<String>,

    /// Per-strategy timeout in milliseconds.
    ///
    /// Set via LINKCARD_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Cache TTL for successful records in milliseconds.
    ///
    /// Set via LINKCARD_CACHE_TTL_MS environment variable.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Cache TTL for terminal-failure records in milliseconds.
    ///
    /// Set via LINKCARD_FAILURE_TTL_MS environment variable.
    #[serde(default = "default_failure_ttl_ms")]
    pub failure_ttl_ms: u64,

    /// Maximum bytes fetched per page (card metadata lives in `<head>`).
    ///
    /// Set via LINKCARD_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Full-pipeline retries after a totally failed attempt.
    ///
    /// Set via LINKCARD_RETRY_BUDGET environment variable.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,

    /// Batch group size for `resolve_many`.
    ///
    /// Set via LINKCARD_BATCH_SIZE environment variable.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Default orchestration policy.
    ///
    /// Set via LINKCARD_POLICY environment variable.
    #[serde(default)]
    pub policy: ResolvePolicy,

    /// Glyph used when no icon can be discovered.
    ///
    /// Set via LINKCARD_FALLBACK_ICON environment variable.
    #[serde(default = "default_fallback_icon")]
    pub fallback_icon: String,
}

fn default_user_agent() -> String {
    "linkcard/0.1".into()
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

fn default_max_bytes() -> usize {
    2_097_152 // 2MB
}

fn default_retry_budget() -> u32 {
    1
}

fn default_batch_size() -> usize {
    5
}

fn default_fallback_icon() -> String {
    "🔗".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            backend_endpoint: None,
            timeout_ms: default_timeout_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
            failure_ttl_ms: default_failure_ttl_ms(),
            max_bytes: default_max_bytes(),
            retry_budget: default_retry_budget(),
            batch_size: default_batch_size(),
            policy: ResolvePolicy::Auto,
            fallback_icon: default_fallback_icon(),
        }
    }
}

impl AppConfig {
    /// Strategy timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Per-call options seeded from this configuration.
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            timeout_ms: self.timeout_ms,
            cache_ttl_ms: self.cache_ttl_ms,
            failure_ttl_ms: self.failure_ttl_ms,
            policy: self.policy,
            fallback_icon: self.fallback_icon.clone(),
            retry_budget: self.retry_budget,
            force_refresh: false,
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LINKCARD_`
    /// 2. TOML file from `LINKCARD_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LINKCARD_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LINKCARD_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
