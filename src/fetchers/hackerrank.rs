//! HackerRank client.
//!
//! HackerRank has no public submissions API. The `scores_elo` endpoint only
//! reports an aggregate score per track, so each track with a positive score
//! becomes one "Completed" summary activity stamped with the fetch time.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::{PlatformFetcher, combine, send_json};
use crate::error::FetchError;
use crate::model::{Activity, FetchResult, Platform, PlatformStats};

/// Base URL for the HackerRank REST endpoints.
const HACKERRANK_API_BASE: &str = "https://www.hackerrank.com/rest";

/// Client for HackerRank track scores.
#[derive(Clone)]
pub struct HackerrankFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HackerrankFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, HACKERRANK_API_BASE)
    }

    /// Create a fetcher with a custom base URL (for testing).
    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    async fn fetch_scores(&self, username: &str) -> Result<Vec<TrackScore>, FetchError> {
        let url = format!(
            "{}/hackers/{}/scores_elo",
            self.base_url,
            urlencoding::encode(username)
        );

        let response: ScoresResponse = send_json(self.client.get(&url)).await?;
        Ok(response.into_tracks())
    }
}

#[async_trait]
impl PlatformFetcher for HackerrankFetcher {
    fn platform(&self) -> Platform {
        Platform::Hackerrank
    }

    async fn fetch(&self, handle: &str) -> FetchResult {
        match self.fetch_scores(handle).await {
            Ok(tracks) => {
                let (activities, stats) = summarize_tracks(tracks, Utc::now().timestamp());
                combine(Platform::Hackerrank, handle, Ok(activities), Ok(stats))
            }
            Err(e) => {
                warn!(handle = %handle, error = %e, "Failed to fetch HackerRank track scores");
                FetchResult::empty()
            }
        }
    }
}

/// Turn track scores into summary activities and a `tracks` stats map.
///
/// Tracks with a zero score are skipped. No positive track means empty stats,
/// so the orchestrator can still try the profile page.
pub fn summarize_tracks(tracks: Vec<TrackScore>, now: i64) -> (Vec<Activity>, PlatformStats) {
    let mut activities = Vec::new();
    let mut scores = BTreeMap::new();

    for track in tracks {
        let score = track.effective_score();
        let Some(name) = track.name() else { continue };
        if score <= 0.0 {
            continue;
        }

        activities.push(
            Activity::new(
                Platform::Hackerrank,
                &format!("{}-summary", name),
                &format!("{} Track", name),
                "Completed",
                now,
            )
            .with_tags(vec![name.to_string()])
            .with_score(score),
        );
        scores.insert(name.to_string(), score);
    }

    if scores.is_empty() {
        return (activities, PlatformStats::new());
    }

    let total: f64 = scores.values().sum();
    let stats = PlatformStats::from_value(json!({
        "tracks": scores,
        "total_score": total,
    }));

    (activities, stats)
}

// ============================================================================
// Response types
// ============================================================================

/// `scores_elo` has been seen both as a bare array and wrapped in `models`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScoresResponse {
    Wrapped {
        #[serde(default)]
        models: Vec<TrackScore>,
    },
    Bare(Vec<TrackScore>),
}

impl ScoresResponse {
    pub fn into_tracks(self) -> Vec<TrackScore> {
        match self {
            ScoresResponse::Wrapped { models } => models,
            ScoresResponse::Bare(tracks) => tracks,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackScore {
    #[serde(default)]
    pub track: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub score: Option<f64>,

    #[serde(default)]
    pub practice: Option<PracticeScore>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PracticeScore {
    #[serde(default)]
    pub score: Option<f64>,
}

impl TrackScore {
    fn name(&self) -> Option<&str> {
        self.track
            .as_deref()
            .or(self.name.as_deref())
            .filter(|n| !n.is_empty())
    }

    fn effective_score(&self) -> f64 {
        self.score
            .or_else(|| self.practice.as_ref().and_then(|p| p.score))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_models() {
        let response: ScoresResponse = serde_json::from_value(json!({
            "models": [
                {"track": "algorithms", "score": 850.5},
                {"track": "sql", "score": 0}
            ]
        }))
        .unwrap();

        let (activities, stats) = summarize_tracks(response.into_tracks(), 1700000000);

        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].id, "algorithms-summary");
        assert_eq!(activities[0].title, "algorithms Track");
        assert_eq!(activities[0].verdict, "Completed");
        assert_eq!(activities[0].timestamp, 1700000000);
        assert_eq!(activities[0].score, Some(850.5));
        assert_eq!(stats.get("tracks"), Some(&json!({"algorithms": 850.5})));
    }

    #[test]
    fn test_bare_array_with_practice_scores() {
        let response: ScoresResponse = serde_json::from_value(json!([
            {"name": "Python", "slug": "python", "practice": {"score": 115.0, "rank": 300}},
            {"name": "C", "slug": "c", "practice": {"score": 20.0}}
        ]))
        .unwrap();

        let (activities, stats) = summarize_tracks(response.into_tracks(), 1);

        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].tags, vec!["Python"]);
        assert_eq!(stats.get("total_score"), Some(&json!(135.0)));
    }

    #[test]
    fn test_no_positive_tracks_is_empty_stats() {
        let response: ScoresResponse =
            serde_json::from_value(json!({"models": [{"track": "sql", "score": 0}]})).unwrap();

        let (activities, stats) = summarize_tracks(response.into_tracks(), 1);

        assert!(activities.is_empty());
        assert!(stats.is_empty());
    }

    use crate::fetchers::test_support::serve;
    use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};

    async fn scores(Path(handle): Path<String>) -> Result<Json<serde_json::Value>, StatusCode> {
        if handle != "carol" {
            return Err(StatusCode::NOT_FOUND);
        }
        Ok(Json(json!({"models": [
            {"track": "algorithms", "score": 400.0},
            {"track": "sql", "score": 0}
        ]})))
    }

    #[tokio::test]
    async fn test_fetch_scores() {
        let base = serve(Router::new().route("/hackers/:handle/scores_elo", get(scores))).await;
        let fetcher = HackerrankFetcher::with_base_url(reqwest::Client::new(), &base);

        let result = fetcher.fetch("carol").await;

        assert_eq!(result.activities.len(), 1);
        assert_eq!(result.activities[0].id, "algorithms-summary");
        assert_eq!(result.stats.get("total_score"), Some(&json!(400.0)));
    }

    #[tokio::test]
    async fn test_fetch_unknown_handle_is_empty() {
        let base = serve(Router::new().route("/hackers/:handle/scores_elo", get(scores))).await;
        let fetcher = HackerrankFetcher::with_base_url(reqwest::Client::new(), &base);

        assert_eq!(fetcher.fetch("nobody").await, FetchResult::empty());
    }
}
