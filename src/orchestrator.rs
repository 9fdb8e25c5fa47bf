//! Concurrent fetch across every requested judge.
//!
//! The orchestrator normalizes a platform-to-handle map, runs one branch per
//! platform concurrently, and merges whatever came back. A branch runs the
//! platform's fetcher and, when that fails or comes back without statistics,
//! escalates to the profile extractor. One platform failing never affects the
//! others; only when every branch comes back empty is the merged result empty.
//!
//! # Usage
//!
//! ```ignore
//! let orchestrator = FetchOrchestrator::from_config(&config, metrics)?;
//! let merged = orchestrator.fetch_all(&handles).await;
//! if merged.is_total_failure() { /* probably bad handles */ }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::extractor::{FallbackExtractor, ProfileExtractor};
use crate::fetchers::{
    AtcoderFetcher, CodechefFetcher, CodeforcesFetcher, HackerrankFetcher, LeetcodeFetcher,
    PlatformFetcher,
};
use crate::gemini::{GeminiClient, TextGenerator};
use crate::metrics::MetricsSink;
use crate::model::{FetchAllResult, FetchResult, Platform};

/// Fans a handle map out to the platform fetchers.
#[derive(Clone)]
pub struct FetchOrchestrator {
    fetchers: HashMap<Platform, Arc<dyn PlatformFetcher>>,
    extractor: Arc<dyn ProfileExtractor>,
    metrics: Arc<dyn MetricsSink>,
}

impl FetchOrchestrator {
    /// Create an orchestrator from explicit parts.
    ///
    /// Platforms without a fetcher are skipped when requested.
    pub fn new(
        fetchers: Vec<Arc<dyn PlatformFetcher>>,
        extractor: Arc<dyn ProfileExtractor>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let fetchers = fetchers.into_iter().map(|f| (f.platform(), f)).collect();
        Self {
            fetchers,
            extractor,
            metrics,
        }
    }

    /// Wire up the production fetchers, extractor and text generator.
    pub fn from_config(config: &Config, metrics: Arc<dyn MetricsSink>) -> reqwest::Result<Self> {
        let client = config.http_client()?;

        let generator: Option<Arc<dyn TextGenerator>> = config.gemini_api_key.as_deref().map(|key| {
            Arc::new(GeminiClient::new(client.clone(), key, &config.gemini_model))
                as Arc<dyn TextGenerator>
        });
        if generator.is_none() {
            warn!("GEMINI_API_KEY not set; profile-page extraction is disabled");
        }

        let extractor: Arc<dyn ProfileExtractor> =
            Arc::new(FallbackExtractor::new(client.clone(), generator));

        let fetchers: Vec<Arc<dyn PlatformFetcher>> = vec![
            Arc::new(CodeforcesFetcher::new(client.clone())),
            Arc::new(LeetcodeFetcher::new(client.clone())),
            Arc::new(AtcoderFetcher::new(client.clone())),
            Arc::new(HackerrankFetcher::new(client)),
            Arc::new(CodechefFetcher::new(Arc::clone(&extractor))),
        ];

        Ok(Self::new(fetchers, extractor, metrics))
    }

    /// Fetch and merge activity and stats for every usable handle.
    ///
    /// Never fails. Check [`FetchAllResult::is_total_failure`] to tell
    /// "nothing came back" apart from partial success.
    #[instrument(skip_all, fields(requested = handles.len()))]
    pub async fn fetch_all(&self, handles: &BTreeMap<String, String>) -> FetchAllResult {
        let normalized = normalize_handles(handles);

        if normalized.is_empty() {
            warn!("No usable platform handles provided");
            return FetchAllResult::default();
        }

        info!(
            platforms = ?normalized.keys().collect::<Vec<_>>(),
            "Starting platform fan-out"
        );

        let mut branches = JoinSet::new();
        for (platform, handle) in normalized {
            let Some(fetcher) = self.fetchers.get(&platform).cloned() else {
                warn!(platform = %platform, "No fetcher registered for platform");
                continue;
            };
            let extractor = Arc::clone(&self.extractor);
            let metrics = Arc::clone(&self.metrics);

            branches.spawn(async move {
                let started = Instant::now();
                let result = run_branch(platform, handle, fetcher, extractor).await;
                metrics.record_request(
                    &format!("fetch:{}", platform),
                    started.elapsed(),
                    !result.is_empty(),
                );
                (platform, result)
            });
        }

        let mut merged = FetchAllResult::default();
        let mut failed = Vec::new();

        while let Some(joined) = branches.join_next().await {
            let (platform, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "Fetch branch aborted");
                    continue;
                }
            };

            if result.is_empty() {
                failed.push(platform);
                continue;
            }

            merged.activities.extend(result.activities);
            if !result.stats.is_empty() {
                merged.stats.insert(platform, result.stats);
            }
        }

        info!(
            activities = merged.activities.len(),
            stats_platforms = merged.stats.len(),
            "Platform fan-out complete"
        );
        if !failed.is_empty() {
            warn!(failed = ?failed, "Some platforms returned no data");
        }

        merged
    }
}

/// Lower-case and trim platform keys, trim handles, drop blanks and unknown platforms.
pub fn normalize_handles(handles: &BTreeMap<String, String>) -> BTreeMap<Platform, String> {
    let mut normalized = BTreeMap::new();

    for (key, value) in handles {
        let handle = value.trim();
        if handle.is_empty() {
            continue;
        }

        match key.trim().to_lowercase().parse::<Platform>() {
            Ok(platform) => {
                normalized.insert(platform, handle.to_string());
            }
            Err(e) => warn!(error = %e, "Ignoring handle for unsupported platform"),
        }
    }

    normalized
}

/// One platform's fetch, isolated in its own task so a panic counts as failure.
async fn run_branch(
    platform: Platform,
    handle: String,
    fetcher: Arc<dyn PlatformFetcher>,
    extractor: Arc<dyn ProfileExtractor>,
) -> FetchResult {
    let primary = {
        let handle = handle.clone();
        match tokio::spawn(async move { fetcher.fetch(&handle).await }).await {
            Ok(result) => Some(result),
            Err(e) => {
                error!(platform = %platform, error = %e, "Fetcher failed outright");
                None
            }
        }
    };

    resolve_or_fallback(platform, &handle, primary, extractor.as_ref()).await
}

/// Decide whether a fetcher outcome needs the profile extractor, and apply it.
///
/// - `None` (the fetcher failed outright) or an entirely empty result: stats
///   come from the extractor alone.
/// - Activities but no stats: the extractor supplements the stats and the
///   activities are kept.
/// - Non-empty stats: returned unchanged, no extraction.
pub async fn resolve_or_fallback(
    platform: Platform,
    handle: &str,
    primary: Option<FetchResult>,
    extractor: &dyn ProfileExtractor,
) -> FetchResult {
    let mut result = match primary {
        Some(result) if !result.stats.is_empty() => return result,
        Some(result) => {
            if result.activities.is_empty() {
                warn!(platform = %platform, handle = %handle, "No data returned, trying profile page");
            } else {
                info!(platform = %platform, handle = %handle, "No stats from API, trying profile page");
            }
            result
        }
        None => {
            info!(platform = %platform, handle = %handle, "Trying profile page after fetcher failure");
            FetchResult::empty()
        }
    };

    let extracted = extractor.extract(platform, handle).await;
    if extracted.is_empty() {
        warn!(platform = %platform, handle = %handle, "Profile page yielded no stats");
    } else {
        info!(platform = %platform, handle = %handle, "Profile page supplied stats");
        result.stats.merge(extracted);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{NoopMetrics, RequestMetrics};
    use crate::model::{Activity, PlatformStats};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// What a fake fetcher should do when called.
    #[derive(Clone)]
    enum Behavior {
        Return(FetchResult),
        Panic,
    }

    struct FakeFetcher {
        platform: Platform,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(platform: Platform, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                platform,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PlatformFetcher for FakeFetcher {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn fetch(&self, _handle: &str) -> FetchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Return(result) => result.clone(),
                Behavior::Panic => panic!("simulated fetcher crash"),
            }
        }
    }

    /// Extractor returning fixed stats per platform and counting calls.
    #[derive(Default)]
    struct FakeExtractor {
        stats: HashMap<Platform, PlatformStats>,
        calls: AtomicUsize,
    }

    impl FakeExtractor {
        fn with(platform: Platform, stats: serde_json::Value) -> Arc<Self> {
            let mut extractor = Self::default();
            extractor
                .stats
                .insert(platform, PlatformStats::from_value(stats));
            Arc::new(extractor)
        }
    }

    #[async_trait]
    impl ProfileExtractor for FakeExtractor {
        async fn extract(&self, platform: Platform, _handle: &str) -> PlatformStats {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.stats.get(&platform).cloned().unwrap_or_default()
        }
    }

    fn activity(platform: Platform, id: &str) -> Activity {
        Activity::new(platform, id, id, "OK", 1_700_000_000)
    }

    fn result(activities: Vec<Activity>, stats: serde_json::Value) -> FetchResult {
        FetchResult {
            activities,
            stats: PlatformStats::from_value(stats),
        }
    }

    fn handles(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn orchestrator(
        fetchers: Vec<Arc<dyn PlatformFetcher>>,
        extractor: Arc<dyn ProfileExtractor>,
    ) -> FetchOrchestrator {
        FetchOrchestrator::new(fetchers, extractor, Arc::new(NoopMetrics))
    }

    #[test]
    fn test_normalize_handles() {
        let normalized = normalize_handles(&handles(&[
            (" CodeForces ", " tourist "),
            ("LEETCODE", "   "),
            ("atcoder", ""),
            ("topcoder", "someone"),
        ]));

        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized.get(&Platform::Codeforces).map(String::as_str), Some("tourist"));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let fetcher = FakeFetcher::new(Platform::Codeforces, Behavior::Panic);
        let extractor = Arc::new(FakeExtractor::default());
        let orch = orchestrator(vec![fetcher.clone()], extractor.clone());

        let empty = orch.fetch_all(&BTreeMap::new()).await;
        let blank = orch.fetch_all(&handles(&[("cf", "  ")])).await;

        assert!(empty.is_total_failure());
        assert!(blank.is_total_failure());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_stats_skip_fallback() {
        let fetcher = FakeFetcher::new(
            Platform::Codeforces,
            Behavior::Return(result(
                vec![activity(Platform::Codeforces, "1-A")],
                json!({"rating": 1500}),
            )),
        );
        let extractor = Arc::new(FakeExtractor::default());
        let orch = orchestrator(vec![fetcher], extractor.clone());

        let merged = orch.fetch_all(&handles(&[("codeforces", "tourist")])).await;

        assert_eq!(merged.activities.len(), 1);
        assert_eq!(merged.stats[&Platform::Codeforces].count("rating"), 1500);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_stats_are_supplemented() {
        let fetcher = FakeFetcher::new(
            Platform::Leetcode,
            Behavior::Return(result(
                vec![activity(Platform::Leetcode, "two-sum")],
                json!({}),
            )),
        );
        let extractor = FakeExtractor::with(Platform::Leetcode, json!({"total_solved": 42}));
        let orch = orchestrator(vec![fetcher], extractor.clone());

        let merged = orch.fetch_all(&handles(&[("leetcode", "alice")])).await;

        assert_eq!(merged.activities.len(), 1);
        assert_eq!(merged.stats[&Platform::Leetcode].count("total_solved"), 42);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_fetcher_falls_back() {
        let crashing = FakeFetcher::new(Platform::Atcoder, Behavior::Panic);
        let healthy = FakeFetcher::new(
            Platform::Codeforces,
            Behavior::Return(result(
                vec![activity(Platform::Codeforces, "1-A")],
                json!({"rating": 1200}),
            )),
        );
        let extractor = FakeExtractor::with(Platform::Atcoder, json!({"rating": 2000}));
        let orch = orchestrator(vec![crashing, healthy], extractor);

        let merged = orch
            .fetch_all(&handles(&[("atcoder", "chokudai"), ("codeforces", "tourist")]))
            .await;

        assert_eq!(merged.activities.len(), 1);
        assert_eq!(merged.stats[&Platform::Atcoder].count("rating"), 2000);
        assert_eq!(merged.stats[&Platform::Codeforces].count("rating"), 1200);
    }

    #[tokio::test]
    async fn test_total_failure() {
        let a = FakeFetcher::new(Platform::Codeforces, Behavior::Return(FetchResult::empty()));
        let b = FakeFetcher::new(Platform::Hackerrank, Behavior::Panic);
        let extractor = Arc::new(FakeExtractor::default());
        let orch = orchestrator(vec![a, b], extractor.clone());

        let merged = orch
            .fetch_all(&handles(&[("codeforces", "nobody"), ("hackerrank", "nobody")]))
            .await;

        assert!(merged.is_total_failure());
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stats_keys_subset_of_requested() {
        let fetchers: Vec<Arc<dyn PlatformFetcher>> = Platform::ALL
            .iter()
            .map(|p| {
                FakeFetcher::new(
                    *p,
                    Behavior::Return(result(vec![], json!({"rating": 1}))),
                ) as Arc<dyn PlatformFetcher>
            })
            .collect();
        let orch = orchestrator(fetchers, Arc::new(FakeExtractor::default()));

        let merged = orch
            .fetch_all(&handles(&[("LeetCode", "alice"), ("codechef", "chef")]))
            .await;

        let keys: Vec<Platform> = merged.stats.keys().copied().collect();
        assert_eq!(keys, vec![Platform::Leetcode, Platform::Codechef]);
    }

    #[tokio::test]
    async fn test_records_branch_metrics() {
        let fetcher = FakeFetcher::new(Platform::Codeforces, Behavior::Return(FetchResult::empty()));
        let metrics = Arc::new(RequestMetrics::new());
        let orch = FetchOrchestrator::new(
            vec![fetcher],
            Arc::new(FakeExtractor::default()),
            metrics.clone(),
        );

        orch.fetch_all(&handles(&[("codeforces", "nobody")])).await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot["fetch:codeforces"].requests, 1);
        assert_eq!(snapshot["fetch:codeforces"].errors, 1);
    }

    #[tokio::test]
    async fn test_resolve_keeps_activities_when_fallback_empty() {
        let extractor = FakeExtractor::default();
        let resolved = resolve_or_fallback(
            Platform::Hackerrank,
            "carol",
            Some(result(vec![activity(Platform::Hackerrank, "x")], json!({}))),
            &extractor,
        )
        .await;

        assert_eq!(resolved.activities.len(), 1);
        assert!(resolved.stats.is_empty());
    }
}
