//! Dual-source metadata resolution with caching, retry, and batching.
//!
//! ### Pipeline
//! normalize → cache lookup → strategies per policy → merge/enrich →
//! cache write → return. Total strategy failure re-drives the pipeline
//! until the retry budget is spent, then yields a cached terminal record.
//!
//! ### Orchestration
//! - `API_FIRST`: backend, then direct on any backend failure
//! - `CLIENT_FIRST`: direct, backend only to fill missing text fields
//! - `AUTO`: both concurrently, wait for **both** to settle — a losing
//!   strategy's partial data still has enrichment value, so this is a
//!   wait-all join, not a race
//!
//! Past normalization nothing here returns an error: strategy failures
//! fall through internally and at worst produce a record whose `error`
//! field is set.

pub mod merge;

use chrono::{SecondsFormat, Utc};
use futures_util::future::join_all;
use std::sync::Arc;

use crate::backend::{BackendRetrieve, HttpBackend};
use crate::error::StrategyError;
use crate::extract::extract_meta;
use crate::favicon::probe_favicon;
use crate::fetch::url::{NormalizedUrl, normalize};
use crate::fetch::{FetchClient, FetchConfig, PageFetch};
use linkcard_core::{AppConfig, Error, MetaCache, MetadataRecord, PartialMeta, Registry, ResolveOptions, ResolvePolicy};

/// Backend requests get a budget strictly shorter than the strategy
/// timeout, so the delegated fetch settles before the orchestrator gives
/// up on it.
const BACKEND_TIMEOUT_RATIO: f64 = 0.8;

/// The resolution engine.
///
/// Holds the fetch client, the optional backend collaborator, the
/// injected cache, and the curated registry. Cheap to share behind an
/// `Arc`; all methods take `&self`.
pub struct Resolver {
    fetcher: Arc<dyn PageFetch>,
    backend: Option<Arc<dyn BackendRetrieve>>,
    cache: Arc<MetaCache>,
    registry: Registry,
    defaults: ResolveOptions,
    batch_size: usize,
}

impl Resolver {
    /// Build a resolver from application configuration.
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        config.validate().map_err(|e| Error::Config(e.to_string()))?;

        let fetch_config = FetchConfig {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        };
        let fetcher: Arc<dyn PageFetch> = Arc::new(FetchClient::new(fetch_config)?);

        let backend = match &config.backend_endpoint {
            Some(endpoint) => {
                Some(Arc::new(HttpBackend::new(endpoint.clone(), &config.user_agent)?) as Arc<dyn BackendRetrieve>)
            }
            None => None,
        };

        Ok(Self::with_parts(
            fetcher,
            backend,
            Arc::new(MetaCache::new()),
            Registry::builtin(),
            config.resolve_options(),
            config.batch_size,
        ))
    }

    /// Assemble a resolver from explicit parts.
    ///
    /// This is the dependency-injection seam: tests and embedders supply
    /// their own fetcher, backend, cache, and registry.
    pub fn with_parts(
        fetcher: Arc<dyn PageFetch>, backend: Option<Arc<dyn BackendRetrieve>>, cache: Arc<MetaCache>,
        registry: Registry, defaults: ResolveOptions, batch_size: usize,
    ) -> Self {
        Self { fetcher, backend, cache, registry, defaults, batch_size: batch_size.max(1) }
    }

    /// The injected cache store; callers own explicit cache clearing.
    pub fn cache(&self) -> &MetaCache {
        &self.cache
    }

    /// Resolve one URL with the engine-wide default options.
    pub async fn resolve(&self, url: &str) -> Result<MetadataRecord, Error> {
        self.resolve_with(url, &self.defaults).await
    }

    /// Resolve one URL.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` for unnormalizable input — the only
    /// failure that rejects the call. Network and extraction problems are
    /// absorbed into fallback records.
    pub async fn resolve_with(&self, url: &str, opts: &ResolveOptions) -> Result<MetadataRecord, Error> {
        let norm = normalize(url)?;

        if !opts.force_refresh
            && let Some(hit) = self.cache.get(&norm.key)
        {
            tracing::debug!("cache hit for {}", norm.key);
            return Ok(hit);
        }

        let mut last_err = StrategyError::AllFailed("no attempt made".into());

        for attempt in 0..=opts.retry_budget {
            match self.run_strategies(&norm, opts).await {
                Ok(partial) => {
                    let curated = self.registry.get(norm.host());
                    let record = merge::enrich(&norm, partial, curated, &opts.fallback_icon);
                    self.cache.set(norm.key.as_str(), record.clone(), opts.cache_ttl());
                    return Ok(record);
                }
                Err(e) => {
                    tracing::warn!("attempt {} failed for {}: {}", attempt + 1, norm.key, e);
                    last_err = e;
                }
            }
        }

        let record = self.terminal_record(&norm, &last_err, opts);
        // Failure records get the shorter TTL so a transient outage is
        // not cached for the full success window.
        self.cache.set(norm.key.as_str(), record.clone(), opts.failure_ttl());
        Ok(record)
    }

    /// Resolve many URLs with the engine-wide default options.
    pub async fn resolve_many(&self, urls: &[String]) -> Vec<MetadataRecord> {
        self.resolve_many_with(urls, &self.defaults).await
    }

    /// Resolve many URLs under bounded concurrency.
    ///
    /// URLs are processed in groups of `batch_size`; each group is fully
    /// awaited before the next starts, and the output is order-aligned
    /// with the input regardless of completion order within a group. The
    /// batch itself never fails: an unnormalizable URL yields an
    /// error-carrying record in its slot.
    pub async fn resolve_many_with(&self, urls: &[String], opts: &ResolveOptions) -> Vec<MetadataRecord> {
        let mut results = Vec::with_capacity(urls.len());

        for group in urls.chunks(self.batch_size) {
            let settled = join_all(group.iter().map(|url| self.resolve_or_fallback(url, opts))).await;
            results.extend(settled);
        }

        results
    }

    async fn resolve_or_fallback(&self, url: &str, opts: &ResolveOptions) -> MetadataRecord {
        match self.resolve_with(url, opts).await {
            Ok(record) => record,
            Err(e) => {
                let raw = url.trim().to_string();
                MetadataRecord {
                    title: Some(raw.clone()),
                    icon: Some(opts.fallback_icon.clone()),
                    error: Some(e.to_string()),
                    fetched_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ..MetadataRecord::new(raw)
                }
            }
        }
    }

    /// One pipeline attempt: dispatch strategies per policy.
    async fn run_strategies(&self, norm: &NormalizedUrl, opts: &ResolveOptions) -> Result<PartialMeta, StrategyError> {
        // Zero-I/O shortcut for curated hosts. API_FIRST opts out: it
        // exists to prefer fresh backend data over the static table.
        if opts.policy != ResolvePolicy::ApiFirst
            && let Some(curated) = self.registry.get(norm.host())
        {
            tracing::debug!("known-site shortcut for {}", norm.host());
            return Ok(curated.clone());
        }

        match opts.policy {
            ResolvePolicy::ApiFirst => match self.backend_strategy(norm, opts).await {
                Ok(partial) => Ok(partial),
                Err(e) => {
                    tracing::debug!("backend failed for {} ({}), falling back to direct", norm.key, e);
                    self.direct_strategy(norm, opts).await
                }
            },
            ResolvePolicy::ClientFirst => match self.direct_strategy(norm, opts).await {
                Ok(direct) if direct.has_text_fields() => Ok(direct),
                Ok(direct) => match self.backend_strategy(norm, opts).await {
                    // Direct fields win on conflict.
                    Ok(backend) => Ok(merge::coalesce(&[&direct, &backend])),
                    Err(e) => {
                        tracing::debug!("backend enrichment unavailable for {} ({})", norm.key, e);
                        Ok(direct)
                    }
                },
                Err(e) => {
                    tracing::debug!("direct failed for {} ({}), falling back to backend", norm.key, e);
                    self.backend_strategy(norm, opts).await
                }
            },
            ResolvePolicy::Auto => {
                // Wait-all join: both settle before merging, because a
                // losing strategy's partial data still enriches the
                // winner.
                let (backend, direct) =
                    tokio::join!(self.backend_strategy(norm, opts), self.direct_strategy(norm, opts));

                match (backend, direct) {
                    (Ok(backend), Ok(direct)) => Ok(merge::coalesce(&[&backend, &direct])),
                    (Ok(backend), Err(e)) => {
                        tracing::debug!("direct failed for {} ({}), using backend result", norm.key, e);
                        Ok(backend)
                    }
                    (Err(e), Ok(direct)) => {
                        tracing::debug!("backend failed for {} ({}), using direct result", norm.key, e);
                        Ok(direct)
                    }
                    (Err(backend), Err(direct)) => {
                        Err(StrategyError::AllFailed(format!("backend: {backend}; direct: {direct}")))
                    }
                }
            }
        }
    }

    /// Backend strategy: delegate the fetch, bounded by the strategy
    /// timeout with a strictly shorter internal budget.
    async fn backend_strategy(&self, norm: &NormalizedUrl, opts: &ResolveOptions) -> Result<PartialMeta, StrategyError> {
        let backend = self.backend.as_ref().ok_or(StrategyError::BackendDisabled)?;
        let inner_budget = opts.timeout().mul_f64(BACKEND_TIMEOUT_RATIO);

        match tokio::time::timeout(opts.timeout(), backend.retrieve(&norm.url, inner_budget)).await {
            Ok(result) => result,
            Err(_) => Err(StrategyError::Timeout),
        }
    }

    /// Direct strategy: fetch the page, scan its markup, and probe for a
    /// favicon only when the markup declared no icon.
    async fn direct_strategy(&self, norm: &NormalizedUrl, opts: &ResolveOptions) -> Result<PartialMeta, StrategyError> {
        let work = async {
            let html = self.fetcher.fetch_page(&norm.url).await?;
            let mut meta = extract_meta(&html, &norm.url);

            if meta.icon.is_none() {
                meta.favicon = probe_favicon(&self.fetcher, &norm.origin()).await;
            }

            Ok(meta)
        };

        match tokio::time::timeout(opts.timeout(), work).await {
            Ok(result) => result,
            Err(_) => Err(StrategyError::Timeout),
        }
    }

    /// Terminal record produced once every strategy and retry failed:
    /// domain-name-only data plus the last failure message.
    fn terminal_record(&self, norm: &NormalizedUrl, last_err: &StrategyError, opts: &ResolveOptions) -> MetadataRecord {
        MetadataRecord {
            title: Some(norm.domain()),
            icon: Some(opts.fallback_icon.clone()),
            error: Some(last_err.to_string()),
            fetched_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            ..MetadataRecord::new(norm.key.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    /// Page-fetch fake serving per-host HTML bodies with optional delays.
    #[derive(Default)]
    struct FakeFetch {
        pages: HashMap<String, String>,
        delays: HashMap<String, Duration>,
        fail: bool,
        page_calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl FakeFetch {
        fn serving(html: &str) -> Self {
            Self { pages: HashMap::from([("*".to_string(), html.to_string())]), ..Default::default() }
        }

        fn failing() -> Self {
            Self { fail: true, ..Default::default() }
        }

        fn calls(&self) -> usize {
            self.page_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageFetch for FakeFetch {
        async fn fetch_page(&self, url: &Url) -> Result<String, StrategyError> {
            self.page_calls.fetch_add(1, Ordering::SeqCst);

            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

            let host = url.host_str().unwrap_or_default().to_string();
            if let Some(delay) = self.delays.get(&host) {
                tokio::time::sleep(*delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(StrategyError::Network("connection refused".into()));
            }

            let html = self.pages.get(&host).or_else(|| self.pages.get("*")).cloned();
            html.ok_or(StrategyError::Http { status: 404 })
        }

        async fn probe(&self, _url: &Url) -> bool {
            false
        }
    }

    /// Backend fake returning a fixed partial record or failing.
    #[derive(Default)]
    struct FakeBackend {
        meta: Option<PartialMeta>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BackendRetrieve for FakeBackend {
        async fn retrieve(&self, _url: &Url, _timeout: Duration) -> Result<PartialMeta, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.meta.clone().ok_or(StrategyError::Http { status: 502 })
        }
    }

    fn resolver(
        fetcher: Arc<FakeFetch>, backend: Option<Arc<FakeBackend>>, registry: Registry, opts: ResolveOptions,
    ) -> Resolver {
        Resolver::with_parts(
            fetcher,
            backend.map(|b| b as Arc<dyn BackendRetrieve>),
            Arc::new(MetaCache::new()),
            registry,
            opts,
            5,
        )
    }

    fn opts(policy: ResolvePolicy) -> ResolveOptions {
        ResolveOptions { policy, ..Default::default() }
    }

    #[tokio::test]
    async fn test_cache_hit_avoids_io() {
        let fetcher = Arc::new(FakeFetch::serving(
            r#"<title>Example</title><meta name="description" content="An example page">"#,
        ));
        let engine = resolver(fetcher.clone(), None, Registry::new(), opts(ResolvePolicy::ClientFirst));

        let first = engine.resolve("https://example.com").await.unwrap();
        let second = engine.resolve("https://example.com").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expiry_triggers_fresh_resolution() {
        let fetcher = Arc::new(FakeFetch::serving(
            r#"<title>Example</title><meta name="description" content="d">"#,
        ));
        let options = ResolveOptions { cache_ttl_ms: 1_000, ..opts(ResolvePolicy::ClientFirst) };
        let engine = resolver(fetcher.clone(), None, Registry::new(), options);

        engine.resolve("https://example.com").await.unwrap();
        tokio::time::advance(Duration::from_millis(1_500)).await;
        engine.resolve("https://example.com").await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let fetcher = Arc::new(FakeFetch::serving(
            r#"<title>Example</title><meta name="description" content="d">"#,
        ));
        let engine = resolver(fetcher.clone(), None, Registry::new(), opts(ResolvePolicy::ClientFirst));

        engine.resolve("https://example.com").await.unwrap();

        let bypass = ResolveOptions { force_refresh: true, ..opts(ResolvePolicy::ClientFirst) };
        engine.resolve_with("https://example.com", &bypass).await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_auto_merge_backend_primary() {
        let fetcher = Arc::new(FakeFetch::serving(
            r#"<title>Y</title><meta name="description" content="Z">"#,
        ));
        let backend = Arc::new(FakeBackend {
            meta: Some(PartialMeta { title: Some("X".to_string()), ..Default::default() }),
            ..Default::default()
        });
        let engine = resolver(fetcher, Some(backend), Registry::new(), opts(ResolvePolicy::Auto));

        let record = engine.resolve("https://example.com").await.unwrap();
        assert_eq!(record.title.as_deref(), Some("X"));
        assert_eq!(record.description.as_deref(), Some("Z"));
    }

    #[tokio::test]
    async fn test_auto_direct_survives_backend_failure() {
        let fetcher = Arc::new(FakeFetch::serving(
            r#"<title>Direct</title><meta name="description" content="d">"#,
        ));
        let backend = Arc::new(FakeBackend::default());
        let engine = resolver(fetcher, Some(backend.clone()), Registry::new(), opts(ResolvePolicy::Auto));

        let record = engine.resolve("https://example.com").await.unwrap();
        assert_eq!(record.title.as_deref(), Some("Direct"));
        assert!(record.error.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deterministic_defaulting() {
        let fetcher = Arc::new(FakeFetch::serving("<html></html>"));
        let options = ResolveOptions { fallback_icon: "★".to_string(), ..opts(ResolvePolicy::Auto) };
        let engine = resolver(fetcher, None, Registry::new(), options);

        let record = engine.resolve("https://example.org").await.unwrap();
        assert_eq!(record.title.as_deref(), Some("example.org"));
        assert_eq!(record.site_name.as_deref(), Some("example.org"));
        assert_eq!(record.icon.as_deref(), Some("★"));
        assert_eq!(record.description.as_deref(), Some("example.org 网站"));
        assert!(record.error.is_none());
    }

    #[tokio::test]
    async fn test_client_first_backend_enrichment() {
        let fetcher = Arc::new(FakeFetch::serving("<title>Direct Title</title>"));
        let backend = Arc::new(FakeBackend {
            meta: Some(PartialMeta {
                title: Some("Backend Title".to_string()),
                description: Some("Backend description".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let engine = resolver(fetcher, Some(backend.clone()), Registry::new(), opts(ResolvePolicy::ClientFirst));

        let record = engine.resolve("https://example.com").await.unwrap();
        // Direct fields win on conflict; backend fills the gap.
        assert_eq!(record.title.as_deref(), Some("Direct Title"));
        assert_eq!(record.description.as_deref(), Some("Backend description"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_client_first_complete_direct_skips_backend() {
        let fetcher = Arc::new(FakeFetch::serving(
            r#"<title>T</title><meta name="description" content="D">"#,
        ));
        let backend = Arc::new(FakeBackend::default());
        let engine = resolver(fetcher, Some(backend.clone()), Registry::new(), opts(ResolvePolicy::ClientFirst));

        engine.resolve("https://example.com").await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_api_first_falls_back_to_direct() {
        let fetcher = Arc::new(FakeFetch::serving(
            r#"<title>Fallback</title><meta name="description" content="d">"#,
        ));
        let backend = Arc::new(FakeBackend::default());
        let engine = resolver(fetcher, Some(backend), Registry::new(), opts(ResolvePolicy::ApiFirst));

        let record = engine.resolve("https://example.com").await.unwrap();
        assert_eq!(record.title.as_deref(), Some("Fallback"));
    }

    #[tokio::test]
    async fn test_retry_termination_and_terminal_record() {
        let fetcher = Arc::new(FakeFetch::failing());
        let backend = Arc::new(FakeBackend::default());
        let options = ResolveOptions { retry_budget: 2, ..opts(ResolvePolicy::Auto) };
        let engine = resolver(fetcher.clone(), Some(backend.clone()), Registry::new(), options);

        let record = engine.resolve("https://example.com").await.unwrap();

        // Exactly 3 pipeline attempts, each driving both strategies.
        assert_eq!(fetcher.calls(), 3);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(record.title.as_deref(), Some("example.com"));
        assert!(record.error.as_deref().unwrap().contains("connection refused"));

        // Terminal record is cached.
        let cached = engine.cache().get("https://example.com").unwrap();
        assert_eq!(cached, record);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_record_uses_failure_ttl() {
        let fetcher = Arc::new(FakeFetch::failing());
        let options = ResolveOptions {
            retry_budget: 0,
            failure_ttl_ms: 1_000,
            cache_ttl_ms: 3_600_000,
            ..opts(ResolvePolicy::Auto)
        };
        let engine = resolver(fetcher.clone(), None, Registry::new(), options);

        engine.resolve("https://example.com").await.unwrap();
        assert_eq!(fetcher.calls(), 1);

        // Within the failure TTL the terminal record is served from cache.
        engine.resolve("https://example.com").await.unwrap();
        assert_eq!(fetcher.calls(), 1);

        // Past the failure TTL (but well within the success TTL) a fresh
        // resolution is attempted.
        tokio::time::advance(Duration::from_millis(1_500)).await;
        engine.resolve("https://example.com").await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_known_site_shortcut_no_network() {
        let fetcher = Arc::new(FakeFetch::failing());
        let engine = resolver(fetcher.clone(), None, Registry::builtin(), opts(ResolvePolicy::ClientFirst));

        let record = engine.resolve("https://github.com").await.unwrap();
        assert_eq!(record.title.as_deref(), Some("GitHub"));
        assert!(record.description.is_some());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_url_rejects() {
        let fetcher = Arc::new(FakeFetch::default());
        let engine = resolver(fetcher, None, Registry::new(), opts(ResolvePolicy::Auto));

        assert!(matches!(engine.resolve("http://").await, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_preserves_input_order() {
        let mut fetcher = FakeFetch::default();
        for host in ["a.com", "b.com", "c.com"] {
            fetcher
                .pages
                .insert(host.to_string(), format!("<title>{host}</title><meta name=\"description\" content=\"d\">"));
        }
        // b.com resolves slower than c.com.
        fetcher.delays.insert("b.com".to_string(), Duration::from_millis(200));

        let engine = resolver(Arc::new(fetcher), None, Registry::new(), opts(ResolvePolicy::ClientFirst));

        let urls: Vec<String> = ["https://a.com", "https://b.com", "https://c.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let records = engine.resolve_many(&urls).await;

        let titles: Vec<_> = records.iter().map(|r| r.title.as_deref().unwrap()).collect();
        assert_eq!(titles, vec!["a.com", "b.com", "c.com"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_concurrency_bounded_by_group_size() {
        let mut fetcher = FakeFetch::serving(r#"<title>T</title><meta name="description" content="d">"#);
        for host in ["a.com", "b.com", "c.com", "d.com"] {
            fetcher.delays.insert(host.to_string(), Duration::from_millis(50));
        }
        let fetcher = Arc::new(fetcher);

        let engine = Resolver::with_parts(
            fetcher.clone(),
            None,
            Arc::new(MetaCache::new()),
            Registry::new(),
            opts(ResolvePolicy::ClientFirst),
            2,
        );

        let urls: Vec<String> = ["https://a.com", "https://b.com", "https://c.com", "https://d.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        engine.resolve_many(&urls).await;

        assert!(fetcher.peak_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test]
    async fn test_batch_never_throws_per_item_fallback() {
        let fetcher = Arc::new(FakeFetch::serving(
            r#"<title>Good</title><meta name="description" content="d">"#,
        ));
        let engine = resolver(fetcher, None, Registry::new(), opts(ResolvePolicy::ClientFirst));

        let urls = vec!["https://good.example".to_string(), "http://".to_string()];
        let records = engine.resolve_many(&urls).await;

        assert_eq!(records.len(), 2);
        assert!(records[0].error.is_none());
        assert!(records[1].error.is_some());
        assert_eq!(records[1].url, "http://");
    }
}
