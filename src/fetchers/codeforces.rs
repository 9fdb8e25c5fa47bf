//! Codeforces API client.
//!
//! # API Reference
//!
//! See: <https://codeforces.com/apiHelp>
//!
//! Every response is wrapped in `{"status": "OK" | "FAILED", "result": ..., "comment": ...}`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{PlatformFetcher, combine, send_json};
use crate::error::FetchError;
use crate::model::{Activity, FetchResult, Platform, PlatformStats};

/// Base URL for the Codeforces API.
const CODEFORCES_API_BASE: &str = "https://codeforces.com/api";

/// Most recent submissions to keep.
const SUBMISSION_LIMIT: usize = 100;

/// Client for the Codeforces public API.
#[derive(Clone)]
pub struct CodeforcesFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl CodeforcesFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, CODEFORCES_API_BASE)
    }

    /// Create a fetcher with a custom base URL (for testing).
    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    /// Fetch the most recent submissions, newest first.
    async fn fetch_submissions(&self, handle: &str) -> Result<Vec<Activity>, FetchError> {
        let url = format!(
            "{}/user.status?handle={}&from=1&count={}",
            self.base_url,
            urlencoding::encode(handle),
            SUBMISSION_LIMIT
        );

        let response: CodeforcesResponse<Vec<CodeforcesSubmission>> =
            send_json(self.client.get(&url)).await?;
        Ok(parse_submissions(response.into_result()?))
    }

    async fn fetch_user_info(&self, handle: &str) -> Result<PlatformStats, FetchError> {
        let url = format!(
            "{}/user.info?handles={}",
            self.base_url,
            urlencoding::encode(handle)
        );

        let response: CodeforcesResponse<Vec<CodeforcesUser>> =
            send_json(self.client.get(&url)).await?;
        let user = response
            .into_result()?
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::UserNotFound(handle.to_string()))?;
        Ok(user.into_stats())
    }
}

#[async_trait]
impl PlatformFetcher for CodeforcesFetcher {
    fn platform(&self) -> Platform {
        Platform::Codeforces
    }

    async fn fetch(&self, handle: &str) -> FetchResult {
        let (submissions, user_info) =
            tokio::join!(self.fetch_submissions(handle), self.fetch_user_info(handle));
        combine(Platform::Codeforces, handle, submissions, user_info)
    }
}

/// Convert raw submissions into activities, keeping at most [`SUBMISSION_LIMIT`].
pub fn parse_submissions(submissions: Vec<CodeforcesSubmission>) -> Vec<Activity> {
    submissions
        .into_iter()
        .take(SUBMISSION_LIMIT)
        .map(|s| {
            let problem = s.problem;
            let contest = problem
                .contest_id
                .or(s.contest_id)
                .map(|id| id.to_string())
                .unwrap_or_default();
            let id = format!("{}-{}", contest, problem.index);
            let title = problem.name.unwrap_or_else(|| "Unknown".to_string());
            let verdict = s.verdict.unwrap_or_else(|| "UNKNOWN".to_string());

            Activity::new(Platform::Codeforces, &id, &title, &verdict, s.creation_time_seconds)
                .with_tags(problem.tags)
                .with_language(&s.programming_language)
        })
        .collect()
}

// ============================================================================
// Response types
// ============================================================================

/// Envelope shared by every Codeforces API method.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeforcesResponse<T> {
    pub status: String,
    #[serde(default)]
    pub comment: Option<String>,
    pub result: Option<T>,
}

impl<T> CodeforcesResponse<T> {
    /// Unwrap the payload, turning `FAILED` into an API error.
    pub fn into_result(self) -> Result<T, FetchError> {
        match (self.status.as_str(), self.result) {
            ("OK", Some(result)) => Ok(result),
            _ => Err(FetchError::Api(
                self.comment.unwrap_or_else(|| "Unknown error".to_string()),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeforcesSubmission {
    #[serde(default, rename = "contestId")]
    pub contest_id: Option<i64>,

    #[serde(default, rename = "creationTimeSeconds")]
    pub creation_time_seconds: i64,

    pub problem: CodeforcesProblem,

    #[serde(default, rename = "programmingLanguage")]
    pub programming_language: String,

    /// Absent while the submission is still being judged.
    #[serde(default)]
    pub verdict: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeforcesProblem {
    #[serde(default, rename = "contestId")]
    pub contest_id: Option<i64>,

    #[serde(default)]
    pub index: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// User record from `user.info`. Unrated users have no rating fields.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeforcesUser {
    #[serde(default)]
    pub rating: i64,

    #[serde(default, rename = "maxRating")]
    pub max_rating: i64,

    #[serde(default)]
    pub rank: Option<String>,

    #[serde(default, rename = "maxRank")]
    pub max_rank: Option<String>,

    #[serde(default)]
    pub contribution: i64,

    #[serde(default, rename = "friendOfCount")]
    pub friend_of_count: i64,
}

impl CodeforcesUser {
    pub fn into_stats(self) -> PlatformStats {
        PlatformStats::from_value(json!({
            "rating": self.rating,
            "max_rating": self.max_rating,
            "rank": self.rank.unwrap_or_else(|| "unrated".to_string()),
            "max_rank": self.max_rank.unwrap_or_else(|| "unrated".to_string()),
            "contribution": self.contribution,
            "friend_of_count": self.friend_of_count,
        }))
    }
}
