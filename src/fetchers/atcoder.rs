//! AtCoder client backed by the Kenkoooo AtCoder Problems API.
//!
//! AtCoder itself has no public API. Kenkoooo mirrors submissions with a lag
//! of roughly 15-30 minutes, which is acceptable for a practice snapshot.
//!
//! # API Reference
//!
//! See: <https://github.com/kenkoooo/AtCoderProblems/blob/master/doc/api.md>

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{PlatformFetcher, combine, send_json};
use crate::error::FetchError;
use crate::model::{Activity, FetchResult, Platform, PlatformStats};

/// Base URL for the Kenkoooo API.
const KENKOOOO_API_BASE: &str = "https://kenkoooo.com/atcoder/atcoder-api/v3";

/// Most recent submissions to keep.
const SUBMISSION_LIMIT: usize = 100;

/// Client for AtCoder data via Kenkoooo.
#[derive(Clone)]
pub struct AtcoderFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl AtcoderFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, KENKOOOO_API_BASE)
    }

    /// Create a fetcher with a custom base URL (for testing).
    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    async fn fetch_submissions(&self, user: &str) -> Result<Vec<Activity>, FetchError> {
        let request = self
            .client
            .get(format!("{}/user/submissions", self.base_url))
            .query(&[("user", user), ("from_second", "0")]);

        let submissions: Vec<AtcoderSubmission> = send_json(request).await?;
        Ok(parse_submissions(submissions))
    }

    async fn fetch_user_info(&self, user: &str) -> Result<PlatformStats, FetchError> {
        let request = self
            .client
            .get(format!("{}/user/info", self.base_url))
            .query(&[("user", user)]);

        let info: Option<AtcoderUserInfo> = send_json(request).await?;
        info.map(AtcoderUserInfo::into_stats)
            .ok_or_else(|| FetchError::UserNotFound(user.to_string()))
    }
}

#[async_trait]
impl PlatformFetcher for AtcoderFetcher {
    fn platform(&self) -> Platform {
        Platform::Atcoder
    }

    async fn fetch(&self, handle: &str) -> FetchResult {
        let (submissions, user_info) =
            tokio::join!(self.fetch_submissions(handle), self.fetch_user_info(handle));
        combine(Platform::Atcoder, handle, submissions, user_info)
    }
}

/// Convert submissions into activities, keeping the newest [`SUBMISSION_LIMIT`].
///
/// Kenkoooo returns submissions oldest first.
pub fn parse_submissions(mut submissions: Vec<AtcoderSubmission>) -> Vec<Activity> {
    submissions.sort_by(|a, b| b.epoch_second.cmp(&a.epoch_second));

    submissions
        .into_iter()
        .take(SUBMISSION_LIMIT)
        .map(|s| {
            let id = format!("{}-{}", s.contest_id, s.problem_id);
            let title = if s.problem_id.is_empty() {
                "Unknown".to_string()
            } else {
                s.problem_id.clone()
            };
            let verdict = if s.result.is_empty() {
                "UNKNOWN"
            } else {
                s.result.as_str()
            };

            Activity::new(Platform::Atcoder, &id, &title, verdict, s.epoch_second)
                .with_contest(&s.contest_id)
                .with_language(&s.language)
        })
        .collect()
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AtcoderSubmission {
    #[serde(default)]
    pub epoch_second: i64,

    #[serde(default)]
    pub problem_id: String,

    #[serde(default)]
    pub contest_id: String,

    #[serde(default)]
    pub language: String,

    /// "AC", "WA", "TLE", ...
    #[serde(default)]
    pub result: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AtcoderUserInfo {
    #[serde(default)]
    pub rating: i64,

    #[serde(default)]
    pub highest_rating: i64,

    #[serde(default)]
    pub rank: i64,

    #[serde(default)]
    pub accepted_count: u64,
}

impl AtcoderUserInfo {
    pub fn into_stats(self) -> PlatformStats {
        PlatformStats::from_value(json!({
            "rating": self.rating,
            "highest_rating": self.highest_rating,
            "rank": self.rank,
            "accepted_count": self.accepted_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submissions_newest_first() {
        let submissions: Vec<AtcoderSubmission> = serde_json::from_value(json!([
            {"id": 1, "epoch_second": 1600000000, "problem_id": "abc100_a", "contest_id": "abc100", "language": "C++ (GCC 9.2.1)", "result": "WA"},
            {"id": 2, "epoch_second": 1600000500, "problem_id": "abc100_a", "contest_id": "abc100", "language": "C++ (GCC 9.2.1)", "result": "AC"}
        ]))
        .unwrap();

        let activities = parse_submissions(submissions);

        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].timestamp, 1600000500);
        assert_eq!(activities[0].verdict, "AC");
        assert_eq!(activities[0].id, "abc100-abc100_a");
        assert_eq!(activities[0].contest.as_deref(), Some("abc100"));
        assert_eq!(activities[1].verdict, "WA");
    }

    #[test]
    fn test_parse_submissions_keeps_most_recent_window() {
        let submissions = (0..120)
            .map(|i| AtcoderSubmission {
                epoch_second: 1_600_000_000 + i,
                problem_id: format!("p{}", i),
                contest_id: "abc".to_string(),
                language: String::new(),
                result: "AC".to_string(),
            })
            .collect();

        let activities = parse_submissions(submissions);

        assert_eq!(activities.len(), SUBMISSION_LIMIT);
        assert_eq!(activities[0].title, "p119");
        assert_eq!(activities.last().unwrap().title, "p20");
    }

    #[test]
    fn test_user_info_stats() {
        let info: AtcoderUserInfo = serde_json::from_value(json!({
            "user_id": "chokudai",
            "accepted_count": 2000,
            "rating": 2400,
            "highest_rating": 2800
        }))
        .unwrap();

        let stats = info.into_stats();
        assert_eq!(stats.count("accepted_count"), 2000);
        assert_eq!(stats.count("highest_rating"), 2800);
        assert_eq!(stats.count("rank"), 0);
    }

    use crate::fetchers::test_support::serve;
    use axum::{Json, Router, http::StatusCode, routing::get};

    #[tokio::test]
    async fn test_fetch_unknown_user_keeps_submissions() {
        let router = Router::new()
            .route(
                "/user/submissions",
                get(|| async {
                    Json(json!([
                        {"epoch_second": 1600000000, "problem_id": "abc100_a", "contest_id": "abc100", "language": "Rust", "result": "AC"}
                    ]))
                }),
            )
            .route("/user/info", get(|| async { Json(serde_json::Value::Null) }));
        let base = serve(router).await;

        let fetcher = AtcoderFetcher::with_base_url(reqwest::Client::new(), &base);
        let result = fetcher.fetch("chokudai").await;

        assert_eq!(result.activities.len(), 1);
        assert_eq!(result.activities[0].language.as_deref(), Some("Rust"));
        assert!(result.stats.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_server_errors_are_empty() {
        let router = Router::new()
            .route("/user/submissions", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/user/info", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let base = serve(router).await;

        let fetcher = AtcoderFetcher::with_base_url(reqwest::Client::new(), &base);

        assert_eq!(fetcher.fetch("chokudai").await, FetchResult::empty());
    }
}
