//! Concurrent favicon discovery over conventional paths.
//!
//! Unlike the dual-source resolver's wait-all join, this is a genuine
//! race: every candidate is probed concurrently and the first success
//! wins regardless of list position. Remaining in-flight probes are
//! abandoned when the `JoinSet` is dropped. All candidates failing is a
//! normal outcome, not an error.

use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

use crate::fetch::PageFetch;

/// Conventional favicon locations, root paths first, then common
/// static-asset subdirectories.
pub const CANDIDATE_PATHS: &[&str] = &[
    "/favicon.ico",
    "/favicon.png",
    "/apple-touch-icon.png",
    "/android-chrome-192x192.png",
    "/static/favicon.ico",
    "/static/favicon.png",
    "/assets/favicon.ico",
    "/assets/favicon.png",
    "/img/favicon.ico",
    "/img/favicon.png",
];

/// Race existence probes against every candidate path under `origin`.
///
/// Returns the URL of the first candidate to respond successfully, or
/// `None` when every probe fails.
pub async fn probe_favicon(fetcher: &Arc<dyn PageFetch>, origin: &Url) -> Option<String> {
    let mut set = JoinSet::new();

    for path in CANDIDATE_PATHS {
        let candidate = match origin.join(path) {
            Ok(url) => url,
            Err(_) => continue,
        };
        let fetcher = Arc::clone(fetcher);
        set.spawn(async move {
            if fetcher.probe(&candidate).await { Some(candidate.to_string()) } else { None }
        });
    }

    while let Some(joined) = set.join_next().await {
        if let Ok(Some(found)) = joined {
            tracing::debug!("favicon race won by {}", found);
            // Dropping the set aborts the remaining probes.
            return Some(found);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrategyError;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Probe fake that answers success for one configured path after a
    /// per-path delay.
    struct FakeProbe {
        hit_path: Option<&'static str>,
        hit_delay: Duration,
        miss_delay: Duration,
    }

    #[async_trait]
    impl PageFetch for FakeProbe {
        async fn fetch_page(&self, _url: &Url) -> Result<String, StrategyError> {
            Err(StrategyError::Network("not a page fetcher".into()))
        }

        async fn probe(&self, url: &Url) -> bool {
            match self.hit_path {
                Some(path) if url.path() == path => {
                    tokio::time::sleep(self.hit_delay).await;
                    true
                }
                _ => {
                    tokio::time::sleep(self.miss_delay).await;
                    false
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fastest_candidate_wins_regardless_of_position() {
        // The 3rd-listed candidate responds fastest; everything else is slow.
        let fetcher: Arc<dyn PageFetch> = Arc::new(FakeProbe {
            hit_path: Some("/apple-touch-icon.png"),
            hit_delay: Duration::from_millis(10),
            miss_delay: Duration::from_millis(500),
        });
        let origin = Url::parse("https://example.com/").unwrap();

        let found = probe_favicon(&fetcher, &origin).await;
        assert_eq!(found.as_deref(), Some("https://example.com/apple-touch-icon.png"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_probes_failing_is_none() {
        let fetcher: Arc<dyn PageFetch> = Arc::new(FakeProbe {
            hit_path: None,
            hit_delay: Duration::ZERO,
            miss_delay: Duration::from_millis(5),
        });
        let origin = Url::parse("https://example.com/").unwrap();

        assert!(probe_favicon(&fetcher, &origin).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subpath_candidate_found() {
        let fetcher: Arc<dyn PageFetch> = Arc::new(FakeProbe {
            hit_path: Some("/static/favicon.png"),
            hit_delay: Duration::from_millis(1),
            miss_delay: Duration::from_millis(50),
        });
        let origin = Url::parse("https://example.com/").unwrap();

        let found = probe_favicon(&fetcher, &origin).await;
        assert_eq!(found.as_deref(), Some("https://example.com/static/favicon.png"));
    }
}
