//! Clients for the public surfaces of each supported judge.
//!
//! Every fetcher turns one handle into a [`FetchResult`]. Fetchers never fail
//! from the caller's point of view: network errors, timeouts and unexpected
//! payloads are logged here and replaced by empty activities and/or empty
//! stats. Where a platform exposes both a submissions feed and a user-info
//! endpoint, the two are queried concurrently and combined independently.
//!
//! # Platforms
//!
//! - [`codeforces`]: official JSON API, submissions + user info
//! - [`leetcode`]: GraphQL, one query for profile and recent submissions
//! - [`atcoder`]: Kenkoooo community API, submissions + user info
//! - [`hackerrank`]: track scores only, no per-submission feed
//! - [`codechef`]: no API at all, statistics come from the profile extractor

pub mod atcoder;
pub mod codechef;
pub mod codeforces;
pub mod hackerrank;
pub mod leetcode;

pub use atcoder::AtcoderFetcher;
pub use codechef::CodechefFetcher;
pub use codeforces::CodeforcesFetcher;
pub use hackerrank::HackerrankFetcher;
pub use leetcode::LeetcodeFetcher;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::FetchError;
use crate::model::{Activity, FetchResult, Platform, PlatformStats};

/// One judge's handle-to-history client.
#[async_trait]
pub trait PlatformFetcher: Send + Sync {
    /// The judge this fetcher reads.
    fn platform(&self) -> Platform;

    /// Fetch a handle's recent activity and profile statistics.
    ///
    /// Returns [`FetchResult::empty`] rather than an error when nothing could
    /// be retrieved.
    async fn fetch(&self, handle: &str) -> FetchResult;
}

/// Send a request and decode a JSON body, treating non-2xx as an error.
async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, FetchError> {
    let response = request.header("Cache-Control", "no-cache").send().await?;

    if !response.status().is_success() {
        return Err(FetchError::Status(response.status().as_u16()));
    }

    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Combine independently-obtained activities and stats, logging failures.
fn combine(
    platform: Platform,
    handle: &str,
    activities: Result<Vec<Activity>, FetchError>,
    stats: Result<PlatformStats, FetchError>,
) -> FetchResult {
    let activities = activities.unwrap_or_else(|e| {
        warn!(platform = %platform, handle = %handle, error = %e, "Failed to fetch submissions");
        Vec::new()
    });

    let stats = stats.unwrap_or_else(|e| {
        warn!(platform = %platform, handle = %handle, error = %e, "Failed to fetch user info");
        PlatformStats::new()
    });

    info!(
        platform = %platform,
        handle = %handle,
        activities = activities.len(),
        stat_fields = stats.len(),
        "Fetched platform data"
    );

    FetchResult { activities, stats }
}

/// Read an integer that may arrive as a JSON number or a numeric string.
fn loose_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::get};
    use serde_json::json;
    use std::time::Duration;
    use tokio_test::assert_err;

    #[test]
    fn test_loose_i64() {
        assert_eq!(loose_i64(&json!(1700000000)), 1700000000);
        assert_eq!(loose_i64(&json!("1700000000")), 1700000000);
        assert_eq!(loose_i64(&json!(12.7)), 12);
        assert_eq!(loose_i64(&json!(null)), 0);
        assert_eq!(loose_i64(&json!("soon")), 0);
    }

    #[test]
    fn test_combine_keeps_successful_half() {
        let activities = vec![Activity::new(Platform::Codeforces, "1-A", "A", "OK", 1)];
        let result = combine(
            Platform::Codeforces,
            "tourist",
            Ok(activities),
            Err(FetchError::Status(503)),
        );

        assert_eq!(result.activities.len(), 1);
        assert!(result.stats.is_empty());

        let result = combine(
            Platform::Codeforces,
            "tourist",
            Err(FetchError::Api("handle not found".to_string())),
            Ok(PlatformStats::from_value(json!({"rating": 3800}))),
        );

        assert!(result.activities.is_empty());
        assert_eq!(result.stats.count("rating"), 3800);
    }

    #[tokio::test]
    async fn test_send_json_sends_no_cache() {
        let base = test_support::serve(Router::new().route(
            "/echo",
            get(|headers: HeaderMap| async move {
                let cache = headers
                    .get("cache-control")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({"cache_control": cache}))
            }),
        ))
        .await;

        let client = reqwest::Client::new();
        let body: Value = send_json(client.get(format!("{}/echo", base))).await.unwrap();

        assert_eq!(body["cache_control"], "no-cache");
    }

    #[tokio::test]
    async fn test_send_json_rejects_error_status_and_bad_json() {
        let base = test_support::serve(
            Router::new()
                .route("/down", get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }))
                .route("/html", get(|| async { "<html>not json</html>" })),
        )
        .await;
        let client = reqwest::Client::new();

        let err = send_json::<Value>(client.get(format!("{}/down", base)))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(502)));

        let err = send_json::<Value>(client.get(format!("{}/html", base)))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[tokio::test]
    async fn test_send_json_times_out() {
        let base = test_support::serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        ))
        .await;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        let err = assert_err!(send_json::<Value>(client.get(format!("{}/slow", base))).await);
        assert!(matches!(err, FetchError::Http(e) if e.is_timeout()));
    }
}
